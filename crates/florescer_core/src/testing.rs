//! In-memory implementations of the ports, for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::domain::{AuthUser, EmotionalRecord, GenerationContext, ProfilePatch, Session, UserProfile};
use crate::events::{SessionChangeHub, SessionEvent, SessionListener, Subscription};
use crate::notify::{Notice, NoticeLevel};
use crate::ports::{
    AuthError, AuthProvider, MessageGenerationService, Notifier, PortError, PortResult, ProfileStore, SignIn,
};

pub fn sample_profile(email: &str) -> UserProfile {
    UserProfile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        full_name: Some("Ana Souza".to_string()),
        mood: None,
        quiz_result: None,
        completed_rituals: Some(0),
        last_ritual_on: None,
        created_at: Utc::now(),
    }
}

pub fn session_for(user_id: Uuid) -> Session {
    Session {
        access_token: format!("token-{}", Uuid::new_v4()),
        user_id,
        expires_at: Some(Utc::now() + Duration::hours(1)),
    }
}

//=========================================================================================
// Message generator
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
// Profile store
//=========================================================================================

#[derive(Default)]
struct StoreState {
    profiles: HashMap<Uuid, UserProfile>,
    history: Vec<EmotionalRecord>,
    saved: HashMap<Uuid, Vec<String>>,
    update_error: Option<PortError>,
    history_error: Option<PortError>,
    gates: HashMap<Uuid, oneshot::Receiver<()>>,
    completed_fetches: HashMap<Uuid, usize>,
    update_calls: usize,
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    state: Mutex<StoreState>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, profile: UserProfile) {
        self.state.lock().unwrap().profiles.insert(profile.id, profile);
    }

    pub fn profile(&self, user_id: Uuid) -> Option<UserProfile> {
        self.state.lock().unwrap().profiles.get(&user_id).cloned()
    }

    pub fn history(&self) -> Vec<EmotionalRecord> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn fail_updates(&self, error: PortError) {
        self.state.lock().unwrap().update_error = Some(error);
    }

    pub fn fail_history(&self, error: PortError) {
        self.state.lock().unwrap().history_error = Some(error);
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }

    /// Makes the next fetch of `user_id` wait until the returned sender fires.
    pub fn hold_profile(&self, user_id: Uuid) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().gates.insert(user_id, rx);
        tx
    }

    pub fn completed_fetches(&self, user_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .completed_fetches
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        let gate = self.state.lock().unwrap().gates.remove(&user_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut state = self.state.lock().unwrap();
        *state.completed_fetches.entry(user_id).or_default() += 1;
        state
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state.update_calls += 1;
        if let Some(e) = state.update_error.clone() {
            return Err(e);
        }
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
        if let Some(e) = state.history_error.clone() {
            return Err(e);
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

//=========================================================================================
// Auth provider
//=========================================================================================

struct Account {
    password: String,
    user_id: Uuid,
    full_name: Option<String>,
}

#[derive(Default)]
struct AuthState {
    accounts: HashMap<String, Account>,
    current: Option<Session>,
    sign_in_error: Option<AuthError>,
    sign_out_error: Option<AuthError>,
    probe_error: Option<AuthError>,
    sign_in_calls: usize,
}

/// Behaves like a hosted auth client: it notifies listeners synchronously from
/// inside its own calls.
#[derive(Default)]
pub struct FakeAuthProvider {
    state: Mutex<AuthState>,
    hub: SessionChangeHub,
    emitting: AtomicBool,
    reentrant: AtomicUsize,
}

impl FakeAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, email: &str, password: &str, user_id: Uuid) {
        self.state.lock().unwrap().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user_id,
                full_name: None,
            },
        );
    }

    pub fn set_current(&self, session: Option<Session>) {
        self.state.lock().unwrap().current = session;
    }

    pub fn fail_sign_in(&self, error: AuthError) {
        self.state.lock().unwrap().sign_in_error = Some(error);
    }

    pub fn fail_sign_out(&self, error: AuthError) {
        self.state.lock().unwrap().sign_out_error = Some(error);
    }

    pub fn fail_probe(&self, error: AuthError) {
        self.state.lock().unwrap().probe_error = Some(error);
    }

    pub fn sign_in_calls(&self) -> usize {
        self.state.lock().unwrap().sign_in_calls
    }

    pub fn full_name_of(&self, email: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(email)
            .and_then(|a| a.full_name.clone())
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    pub fn reentrant_calls(&self) -> usize {
        self.reentrant.load(Ordering::SeqCst)
    }

    /// Pushes a session change as the hosted provider would.
    pub fn push(&self, event: SessionEvent, session: Option<Session>) {
        self.emitting.store(true, Ordering::SeqCst);
        self.hub.emit(event, session);
        self.emitting.store(false, Ordering::SeqCst);
    }

    fn enter(&self) {
        if self.emitting.load(Ordering::SeqCst) {
            self.reentrant.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuthProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignIn, AuthError> {
        self.enter();
        let signed_in = {
            let mut state = self.state.lock().unwrap();
            state.sign_in_calls += 1;
            if let Some(e) = state.sign_in_error.clone() {
                return Err(e);
            }
            let account = state.accounts.get(email).ok_or(AuthError::InvalidCredentials)?;
            if account.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            let session = session_for(account.user_id);
            let user = AuthUser {
                id: account.user_id,
                email: email.to_string(),
            };
            state.current = Some(session.clone());
            SignIn { session, user }
        };
        self.push(SessionEvent::SignedIn, Some(signed_in.session.clone()));
        Ok(signed_in)
    }

    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<AuthUser, AuthError> {
        self.enter();
        let mut state = self.state.lock().unwrap();
        if state.accounts.contains_key(email) {
            return Err(AuthError::AlreadyRegistered);
        }
        if password.len() < 6 {
            return Err(AuthError::WeakPassword("too short".to_string()));
        }
        let user_id = Uuid::new_v4();
        state.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user_id,
                full_name: Some(full_name.to_string()),
            },
        );
        Ok(AuthUser {
            id: user_id,
            email: email.to_string(),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.enter();
        {
            let mut state = self.state.lock().unwrap();
            if let Some(e) = state.sign_out_error.clone() {
                return Err(e);
            }
            state.current = None;
        }
        self.push(SessionEvent::SignedOut, None);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.enter();
        let state = self.state.lock().unwrap();
        match state.probe_error.clone() {
            Some(e) => Err(e),
            None => Ok(state.current.clone()),
        }
    }

    fn on_session_change(&self, listener: SessionListener) -> Subscription {
        self.hub.subscribe(listener)
    }
}

//=========================================================================================
// Notifier
//=========================================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn of_level(&self, level: NoticeLevel) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.level == level)
            .cloned()
            .collect()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.of_level(level).len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
