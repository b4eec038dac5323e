//! crates/florescer_core/src/profile.rs
//!
//! Writing a profile patch through the `ProfileStore`.
//!
//! A patch carrying a mood is a dual write: the profile row first, then an
//! emotional-history entry. The two are not atomic. If the history append
//! fails the profile write is kept and the failure is handed back to the
//! caller as a non-fatal outcome.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{EmotionalRecord, ProfilePatch};
use crate::ports::{PortError, PortResult, ProfileStore};

/// Result of a profile write whose primary update succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// `Some` when the patch carried a mood; the result of the history append.
    pub history: Option<Result<(), PortError>>,
}

impl PatchOutcome {
    pub fn history_failed(&self) -> bool {
        matches!(self.history, Some(Err(_)))
    }
}

/// Applies `patch` to the user's stored profile.
///
/// Returns `Err` only when the primary profile update fails, in which case no
/// history entry is written.
pub async fn write_patch(
    store: &dyn ProfileStore,
    user_id: Uuid,
    patch: &ProfilePatch,
    now: DateTime<Utc>,
) -> PortResult<PatchOutcome> {
    store.update_profile(user_id, patch).await?;

    let history = match &patch.mood {
        Some(mood) => {
            let record = EmotionalRecord {
                user_id,
                mood: mood.clone(),
                recorded_at: now,
            };
            let result = store.insert_emotional_history(&record).await;
            if let Err(e) = &result {
                warn!(%user_id, mood = %mood, error = %e, "Profile updated but emotional history append failed");
            }
            Some(result)
        }
        None => None,
    };

    Ok(PatchOutcome { history })
}
