//! crates/florescer_core/src/program.rs
//!
//! The 21-day program: which day the user is on, and the favourite messages
//! she keeps.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{UserProfile, PROGRAM_LENGTH_DAYS};
use crate::ports::{PortResult, ProfileStore};

/// Where the user stands in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RitualProgress {
    pub completed_rituals: u32,
    pub day: u32,
    pub total_days: u32,
    pub completed_today: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Completed { next_day: u32 },
    /// Today's ritual was already counted.
    AlreadyCompleted,
    /// Every ritual of the program is done.
    Finished,
}

impl Default for RitualProgress {
    fn default() -> Self {
        Self {
            completed_rituals: 0,
            day: 1,
            total_days: PROGRAM_LENGTH_DAYS,
            completed_today: false,
        }
    }
}

impl RitualProgress {
    pub fn from_completed(completed_rituals: u32) -> Self {
        Self {
            completed_rituals,
            day: completed_rituals.saturating_add(1).min(PROGRAM_LENGTH_DAYS),
            ..Self::default()
        }
    }

    /// Progress of `profile` as seen on `today`.
    pub fn for_profile(profile: &UserProfile, today: NaiveDate) -> Self {
        Self {
            completed_today: profile.last_ritual_on == Some(today),
            ..Self::from_completed(profile.completed_rituals.unwrap_or(0))
        }
    }

    /// Counts today's ritual and moves to the next day, never past the last one.
    /// At most one ritual is counted per day.
    pub fn complete(&mut self) -> Completion {
        if self.completed_today {
            return Completion::AlreadyCompleted;
        }
        if self.is_finished() {
            return Completion::Finished;
        }
        self.completed_rituals += 1;
        self.completed_today = true;
        self.day = self.completed_rituals.saturating_add(1).min(self.total_days);
        Completion::Completed { next_day: self.day }
    }

    pub fn is_finished(&self) -> bool {
        self.completed_rituals >= self.total_days
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    AlreadySaved,
}

/// Adds `message` to the user's favourites unless it is already there.
pub async fn save_message(store: &dyn ProfileStore, user_id: Uuid, message: &str) -> PortResult<SaveOutcome> {
    let message = message.trim();
    let saved = store.list_saved_messages(user_id).await?;
    if saved.iter().any(|m| m == message) {
        return Ok(SaveOutcome::AlreadySaved);
    }
    store.insert_saved_message(user_id, message).await?;
    Ok(SaveOutcome::Saved)
}
