//! Per-sender dialogue state.
//!
//! The store keys ephemeral state by the opaque sender id. At most one
//! variant is active per sender: starting a manual entry, sending a new
//! receipt photo, or committing a rate choice all replace whatever was there
//! before. Entries expire after a TTL so abandoned dialogues do not
//! accumulate.
//!
//! All mutation goes through one mutex, so per-key operations are atomic;
//! this is the single-writer-per-sender discipline the dispatcher relies on.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use engine::{ExpenseDraft, MoneyCents};
use tokio::sync::Mutex;

/// Abandoned dialogues are dropped after half an hour.
const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Where a sender currently is in a dialogue. No entry means idle.
#[derive(Clone, Debug, PartialEq)]
pub enum DialogueState {
    /// `manual` was sent; the next valid decimal becomes the amount.
    AwaitingAmount,
    /// Amount accepted; the next valid text becomes the merchant name.
    AwaitingMerchant { amount: MoneyCents },
    /// A staged record (receipt or completed manual entry) waits for a
    /// POS/ATM choice.
    AwaitingRate(ExpenseDraft),
}

struct SessionEntry {
    state: DialogueState,
    touched_at: Instant,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, SessionEntry>>>,
}

impl SessionStore {
    /// Returns the sender's current state, dropping it if expired.
    pub async fn get(&self, sender_id: &str) -> Option<DialogueState> {
        let mut guard = self.inner.lock().await;
        let expired = guard
            .get(sender_id)
            .is_some_and(|entry| entry.touched_at.elapsed() > SESSION_TTL);
        if expired {
            guard.remove(sender_id);
            return None;
        }
        guard.get(sender_id).map(|entry| entry.state.clone())
    }

    /// Replaces the sender's state (last write wins).
    pub async fn set(&self, sender_id: &str, state: DialogueState) {
        let mut guard = self.inner.lock().await;
        guard.insert(
            sender_id.to_string(),
            SessionEntry {
                state,
                touched_at: Instant::now(),
            },
        );
    }

    /// Discards whatever state the sender had.
    pub async fn clear(&self, sender_id: &str) {
        let mut guard = self.inner.lock().await;
        guard.remove(sender_id);
    }

    /// Consumes the staged record if (and only if) the sender is awaiting a
    /// rate choice. The removal and the read are one atomic step, so a
    /// staged record can be committed at most once.
    pub async fn take_staged(&self, sender_id: &str) -> Option<ExpenseDraft> {
        let mut guard = self.inner.lock().await;
        let entry = guard.remove(sender_id)?;
        if entry.touched_at.elapsed() > SESSION_TTL {
            return None;
        }
        match entry.state {
            DialogueState::AwaitingRate(draft) => Some(draft),
            state => {
                // Some other dialogue is in flight; leave it alone.
                guard.insert(
                    sender_id.to_string(),
                    SessionEntry {
                        state,
                        touched_at: entry.touched_at,
                    },
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft() -> ExpenseDraft {
        ExpenseDraft::manual(
            "Migros",
            MoneyCents::new(4550),
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        )
    }

    #[tokio::test]
    async fn set_get_and_clear() {
        let store = SessionStore::default();
        assert_eq!(store.get("a").await, None);

        store.set("a", DialogueState::AwaitingAmount).await;
        assert_eq!(store.get("a").await, Some(DialogueState::AwaitingAmount));
        assert_eq!(store.get("b").await, None);

        store.clear("a").await;
        assert_eq!(store.get("a").await, None);
    }

    #[tokio::test]
    async fn take_staged_consumes_exactly_once() {
        let store = SessionStore::default();
        store.set("a", DialogueState::AwaitingRate(draft())).await;

        assert!(store.take_staged("a").await.is_some());
        assert!(store.take_staged("a").await.is_none());
        assert_eq!(store.get("a").await, None);
    }

    #[tokio::test]
    async fn take_staged_ignores_other_states() {
        let store = SessionStore::default();
        store.set("a", DialogueState::AwaitingAmount).await;

        assert!(store.take_staged("a").await.is_none());
        assert_eq!(store.get("a").await, Some(DialogueState::AwaitingAmount));
    }

    #[tokio::test]
    async fn newer_state_supersedes_older() {
        let store = SessionStore::default();
        store.set("a", DialogueState::AwaitingAmount).await;
        store.set("a", DialogueState::AwaitingRate(draft())).await;

        assert!(matches!(
            store.get("a").await,
            Some(DialogueState::AwaitingRate(_))
        ));
    }
}
