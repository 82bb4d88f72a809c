//! Exchange-rate categories and the configured rate table.
//!
//! Every purchase is paid in TRY but tracked in MWK. Which multiplier
//! applies depends on how the money entered Turkey: swiped at a `POS`
//! terminal or withdrawn at an `ATM`. The two rates are configured
//! independently and the user picks one per receipt.

use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents};

/// The closed set of conversion modes a user can pick for an expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RateCategory {
    Pos,
    Atm,
}

impl RateCategory {
    /// All categories, in display order. Summaries report a total for each
    /// even when no expense used it.
    pub const ALL: [RateCategory; 2] = [RateCategory::Pos, RateCategory::Atm];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pos => "POS",
            Self::Atm => "ATM",
        }
    }
}

impl core::fmt::Display for RateCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RateCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "POS" => Ok(Self::Pos),
            "ATM" => Ok(Self::Atm),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid rate category: {other}"
            ))),
        }
    }
}

/// The two configured MWK-per-TRY multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub pos: f64,
    pub atm: f64,
}

impl RateTable {
    pub fn new(pos: f64, atm: f64) -> Self {
        Self { pos, atm }
    }

    /// Returns the configured multiplier for a category.
    #[must_use]
    pub fn rate_for(&self, category: RateCategory) -> f64 {
        match category {
            RateCategory::Pos => self.pos,
            RateCategory::Atm => self.atm,
        }
    }

    /// Converts a source (TRY) amount into the target (MWK) amount.
    ///
    /// Working in minor units, `round(source_minor × rate)` is exactly
    /// `round(source_major × rate, 2)` expressed in minor units, so the
    /// arithmetic invariant on stored expenses holds by construction.
    #[must_use]
    pub fn convert(&self, source: MoneyCents, category: RateCategory) -> MoneyCents {
        let rate = self.rate_for(category);
        MoneyCents::new((source.cents() as f64 * rate).round() as i64)
    }
}
