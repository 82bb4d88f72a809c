//! Receipt extraction pipeline.
//!
//! Three stages: recognition (image → raw text), structuring (raw text →
//! loose JSON record) and validation (loose record → committable draft).
//! The first two are external providers behind traits; validation is local
//! and total. A provider failure halts the pipeline and reports which stage
//! failed; nothing is staged in that case.

use chrono::NaiveDate;
use engine::{ExpenseDraft, RawReceipt, receipt};

/// Pipeline stage that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Ocr,
    Llm,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Llm => "llm",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{} stage failed: {message}", stage.as_str())]
pub struct ProviderError {
    pub stage: Stage,
    pub message: String,
}

impl ProviderError {
    pub fn ocr(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Ocr,
            message: message.into(),
        }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Llm,
            message: message.into(),
        }
    }
}

/// Raw text recognized from a receipt photo.
#[derive(Clone, Debug)]
pub struct Recognized {
    pub text: String,
    /// Provider self-reported confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Optical text recognition collaborator.
pub trait Recognizer {
    fn recognize(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<Recognized, ProviderError>> + Send;
}

/// Text-to-structured-record collaborator.
pub trait Structurer {
    fn structure(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<RawReceipt, ProviderError>> + Send;
}

/// Runs the full pipeline over one image.
pub async fn extract<R: Recognizer, S: Structurer>(
    recognizer: &R,
    structurer: &S,
    image: &[u8],
    today: NaiveDate,
) -> Result<ExpenseDraft, ProviderError> {
    let recognized = recognizer.recognize(image).await?;
    tracing::debug!(
        chars = recognized.text.len(),
        confidence = recognized.confidence,
        "text recognized"
    );

    let raw = structurer.structure(&recognized.text).await?;
    Ok(receipt::validate(&raw, today))
}
