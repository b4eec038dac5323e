//! crates/florescer_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of the guided program, in days.
pub const PROGRAM_LENGTH_DAYS: u32 = 21;

//=========================================================================================
// Enumerations
//=========================================================================================

/// The emotional state a user picks during a check-in.
///
/// Mood strings coming from storage or the wire are never rejected: a value
/// this build does not know is carried as `Unrecognized` so that older
/// clients keep working when new moods are introduced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mood {
    Cansada,
    Aflita,
    Sensivel,
    Irritada,
    Esperancosa,
    Unrecognized(String),
}

impl Mood {
    /// Every mood the check-in screen offers.
    pub const KNOWN: [Mood; 5] = [
        Mood::Cansada,
        Mood::Aflita,
        Mood::Sensivel,
        Mood::Irritada,
        Mood::Esperancosa,
    ];

    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "cansada" => Mood::Cansada,
            "aflita" => Mood::Aflita,
            "sensível" | "sensivel" => Mood::Sensivel,
            "irritada" => Mood::Irritada,
            "esperançosa" | "esperancosa" => Mood::Esperancosa,
            other => Mood::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Mood::Cansada => "cansada",
            Mood::Aflita => "aflita",
            Mood::Sensivel => "sensível",
            Mood::Irritada => "irritada",
            Mood::Esperancosa => "esperançosa",
            Mood::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for Mood {
    fn from(value: String) -> Self {
        Mood::parse(&value)
    }
}

impl From<Mood> for String {
    fn from(mood: Mood) -> Self {
        mood.as_str().to_string()
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The menopause profile assigned by the onboarding quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuizResult {
    A,
    B,
    C,
    D,
}

impl QuizResult {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "A" => Some(QuizResult::A),
            "B" => Some(QuizResult::B),
            "C" => Some(QuizResult::C),
            "D" => Some(QuizResult::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuizResult::A => "A",
            QuizResult::B => "B",
            QuizResult::C => "C",
            QuizResult::D => "D",
        }
    }

    /// Human readable name of the profile, as shown after the quiz.
    pub fn label(&self) -> &'static str {
        match self {
            QuizResult::A => "Tipo Sabedoria",
            QuizResult::B => "Tipo Transição",
            QuizResult::C => "Tipo Sensibilidade",
            QuizResult::D => "Tipo Renovação",
        }
    }
}

/// Which kind of personalized message is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// The emotional message of the ritual of the day.
    Ritual,
    /// A short inspirational sentence from Célia.
    Celia,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Ritual => "ritual",
            MessageKind::Celia => "celia",
        }
    }
}

//=========================================================================================
// Session & Profile
//=========================================================================================

/// Proof of an authenticated identity, as handed out by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// The identity returned by the auth provider after sign-up or sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Durable per-user record of preferences and progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub mood: Option<Mood>,
    pub quiz_result: Option<QuizResult>,
    pub completed_rituals: Option<u32>,
    /// Day of the most recent ritual completion, in UTC.
    pub last_ritual_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Merges a patch into this profile. `id`, `email` and `created_at` are never touched.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(full_name) = &patch.full_name {
            self.full_name = Some(full_name.clone());
        }
        if let Some(mood) = &patch.mood {
            self.mood = Some(mood.clone());
        }
        if let Some(quiz_result) = patch.quiz_result {
            self.quiz_result = Some(quiz_result);
        }
        if let Some(completed) = patch.completed_rituals {
            self.completed_rituals = Some(completed);
        }
        if let Some(day) = patch.last_ritual_on {
            self.last_ritual_on = Some(day);
        }
    }

    /// The first name, used to address the user in generated messages.
    pub fn first_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
    }
}

/// A typed partial update of a `UserProfile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_result: Option<QuizResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_rituals: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ritual_on: Option<NaiveDate>,
}

impl ProfilePatch {
    pub fn mood(mood: Mood) -> Self {
        Self {
            mood: Some(mood),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.mood.is_none()
            && self.quiz_result.is_none()
            && self.completed_rituals.is_none()
            && self.last_ritual_on.is_none()
    }
}

/// One entry of the user's emotional history. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionalRecord {
    pub user_id: Uuid,
    pub mood: Mood,
    pub recorded_at: DateTime<Utc>,
}

//=========================================================================================
// Personalization
//=========================================================================================

/// Everything the message generator needs to know for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    pub mood: Option<Mood>,
    pub quiz_result: Option<QuizResult>,
    pub day_number: u32,
    pub user_name: Option<String>,
    pub kind: MessageKind,
}

impl GenerationContext {
    pub fn new(kind: MessageKind, mood: Option<Mood>, day_number: u32) -> Self {
        Self {
            mood,
            quiz_result: None,
            day_number: day_number.max(1),
            user_name: None,
            kind,
        }
    }

    /// Builds the context for the given profile, on the user's current program day.
    pub fn for_profile(kind: MessageKind, profile: &UserProfile) -> Self {
        let day_number = profile.completed_rituals.unwrap_or(0).saturating_add(1).min(PROGRAM_LENGTH_DAYS);
        Self {
            mood: profile.mood.clone(),
            quiz_result: profile.quiz_result,
            day_number,
            user_name: profile.first_name().map(str::to_string),
            kind,
        }
    }
}

/// A short message that is guaranteed to be non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct GeneratedMessage(String);

impl GeneratedMessage {
    /// Cleans raw generator output. Returns `None` when nothing is left.
    pub fn from_raw(raw: &str) -> Option<Self> {
        const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '«', '»', '`'];

        let mut text = raw.trim();
        loop {
            let stripped = text.trim_matches(QUOTES).trim();
            if stripped.len() == text.len() {
                break;
            }
            text = stripped;
        }

        if text.is_empty() {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    pub(crate) fn from_static(text: &'static str) -> Self {
        Self(text.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for GeneratedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//=========================================================================================
// Backend-only records
//=========================================================================================

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}
