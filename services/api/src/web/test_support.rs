//! In-memory ports and request helpers for handler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use florescer_core::domain::{
    AuthUser, EmotionalRecord, GenerationContext, Mood, ProfilePatch, UserCredentials, UserProfile,
};
use florescer_core::ports::{
    AccountRepository, AuthError, MessageGenerationService, PortError, PortResult, ProfileStore,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::web::api_router;
use crate::web::state::AppState;

//=========================================================================================
// Backend
//=========================================================================================

#[derive(Default)]
struct BackendState {
    users: HashMap<String, UserCredentials>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    profiles: HashMap<Uuid, UserProfile>,
    history: Vec<EmotionalRecord>,
    saved: HashMap<Uuid, Vec<String>>,
    history_fails: bool,
}

/// Accounts and profiles in one shared map, like the real database.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self, user_id: Uuid) -> Option<UserProfile> {
        self.state.lock().unwrap().profiles.get(&user_id).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn set_completed(&self, user_id: Uuid, completed: u32) {
        if let Some(profile) = self.state.lock().unwrap().profiles.get_mut(&user_id) {
            profile.completed_rituals = Some(completed);
        }
    }

    pub fn set_last_ritual(&self, user_id: Uuid, day: NaiveDate) {
        if let Some(profile) = self.state.lock().unwrap().profiles.get_mut(&user_id) {
            profile.last_ritual_on = Some(day);
        }
    }

    pub fn completed(&self, user_id: Uuid) -> u32 {
        self.profile(user_id)
            .and_then(|p| p.completed_rituals)
            .unwrap_or(0)
    }

    pub fn set_mood(&self, user_id: Uuid, mood: Mood) {
        if let Some(profile) = self.state.lock().unwrap().profiles.get_mut(&user_id) {
            profile.mood = Some(mood);
        }
    }

    pub fn history_of(&self, user_id: Uuid) -> Vec<Mood> {
        self.state
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.mood.clone())
            .collect()
    }

    pub fn fail_history(&self) {
        self.state.lock().unwrap().history_fails = true;
    }
}

#[async_trait]
impl AccountRepository for InMemoryBackend {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> Result<AuthUser, AuthError> {
        let mut state = self.state.lock().unwrap();
        if state.users.contains_key(email) {
            return Err(AuthError::AlreadyRegistered);
        }
        let user_id = Uuid::new_v4();
        state.users.insert(
            email.to_string(),
            UserCredentials {
                user_id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        state.profiles.insert(
            user_id,
            UserProfile {
                id: user_id,
                email: email.to_string(),
                full_name: Some(full_name.trim().to_string()).filter(|n| !n.is_empty()),
                mood: None,
                quiz_result: None,
                completed_rituals: Some(0),
                last_ritual_on: None,
                created_at: Utc::now(),
            },
        );
        Ok(AuthUser {
            id: user_id,
            email: email.to_string(),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.state.lock().unwrap().sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state.lock().unwrap().sessions.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryBackend {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        self.profile(user_id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
        if let (Some(current), Some(requested)) = (profile.completed_rituals, patch.completed_rituals) {
            if requested < current {
                return Err(PortError::Conflict(format!("completed_rituals {} < {}", requested, current)));
            }
        }
        profile.apply(patch);
        Ok(())
    }

    async fn insert_emotional_history(&self, record: &EmotionalRecord) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.history_fails {
            return Err(PortError::Unavailable("history table offline".to_string()));
        }
        state.history.push(record.clone());
        Ok(())
    }

    async fn list_saved_messages(&self, user_id: Uuid) -> PortResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .saved
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_saved_message(&self, user_id: Uuid, message: &str) -> PortResult<()> {
        self.state
            .lock()
            .unwrap()
            .saved
            .entry(user_id)
            .or_default()
            .push(message.to_string());
        Ok(())
    }
}

/// Creates an account with a live session and returns its cookie.
pub fn signed_in(backend: &InMemoryBackend, email: &str) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let session_id = Uuid::new_v4().to_string();
    let mut state = backend.state.lock().unwrap();
    state.users.insert(
        email.to_string(),
        UserCredentials {
            user_id,
            email: email.to_string(),
            hashed_password: "not-a-real-hash".to_string(),
        },
    );
    state.profiles.insert(
        user_id,
        UserProfile {
            id: user_id,
            email: email.to_string(),
            full_name: Some("Ana Souza".to_string()),
            mood: None,
            quiz_result: None,
            completed_rituals: Some(0),
            last_ritual_on: None,
            created_at: Utc::now(),
        },
    );
    state
        .sessions
        .insert(session_id.clone(), (user_id, Utc::now() + Duration::days(1)));
    (user_id, format!("session={}", session_id))
}

//=========================================================================================
// Generator
//=========================================================================================

pub struct ScriptedGenerator {
    reply: PortResult<String>,
    calls: AtomicUsize,
    last: Mutex<Option<GenerationContext>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    pub fn failing(error: PortError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<GenerationContext> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageGenerationService for ScriptedGenerator {
    async fn generate(&self, context: &GenerationContext) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(context.clone());
        self.reply.clone()
    }
}

//=========================================================================================
// Requests
//=========================================================================================

pub fn test_app(backend: InMemoryBackend) -> Router {
    test_app_with(backend, ScriptedGenerator::failing(PortError::Unavailable("offline".to_string())))
}

pub fn test_app_with(backend: InMemoryBackend, generator: Arc<ScriptedGenerator>) -> Router {
    let backend = Arc::new(backend);
    api_router(Arc::new(AppState::new(backend.clone(), backend, generator)))
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_request(method: &str, uri: &str, cookie: &str, body: Option<&str>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
