//! crates/florescer_core/src/session.rs
//!
//! The Session Manager: the one authoritative answer to "is somebody signed in,
//! and who". It reconciles caller-initiated operations with the auth
//! provider's push notifications and keeps a mirror of the signed-in user's
//! profile.
//!
//! Readers get immutable `SessionSnapshot`s through a `watch` channel. All
//! writes go through `Inner`, and every write that depends on an earlier
//! read (profile fetches) is checked against the snapshot's epoch inside the
//! same `send_if_modified` call, so a result that belongs to a previous
//! session owner can never land.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{ProfilePatch, Session, UserProfile};
use crate::events::{SessionEvent, Subscription};
use crate::notify::{AccountOperation, Notice, NoticeLevel};
use crate::ports::{AuthError, AuthProvider, Notifier, PortError, PortResult, ProfileStore, SignIn};
use crate::profile;

//=========================================================================================
// State
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Before the first answer from the provider.
    Unknown,
    Anonymous,
    /// A sign-in, sign-up or sign-out is in flight.
    Authenticating,
    Authenticated,
    /// Valid session, profile fetch in flight or failed.
    AuthenticatedProfilePending,
}

/// An immutable view of the session, handed to every reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: AuthState,
    pub session: Option<Session>,
    pub profile: Option<UserProfile>,
    /// Bumped every time the session owner changes.
    epoch: u64,
    /// Sequence number of the newest push notification this snapshot already accounts for.
    seen_seq: u64,
}

impl SessionSnapshot {
    fn unknown() -> Self {
        Self {
            state: AuthState::Unknown,
            session: None,
            profile: None,
            epoch: 0,
            seen_seq: 0,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.state,
            AuthState::Authenticated | AuthState::AuthenticatedProfilePending
        )
    }

    /// Resolves a transient state to the stable one the data supports.
    fn settle(&mut self) {
        self.state = match (&self.session, &self.profile) {
            (None, _) => AuthState::Anonymous,
            (Some(_), Some(_)) => AuthState::Authenticated,
            (Some(_), None) => AuthState::AuthenticatedProfilePending,
        };
    }
}

/// Where the UI should go after a successful sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// The onboarding quiz has not been answered yet.
    Onboarding,
    Dashboard,
}

impl Landing {
    fn for_profile(profile: Option<&UserProfile>) -> Self {
        match profile.and_then(|p| p.quiz_result) {
            Some(_) => Landing::Dashboard,
            None => Landing::Onboarding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account exists but must be confirmed out of band before signing in.
    ConfirmationPending { user_id: Uuid, email: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// The mirror after the merge, if a profile was loaded.
    pub profile: Option<UserProfile>,
    /// `false` when a mood was written but its history entry was not.
    pub history_recorded: bool,
}

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Profile store error: {0}")]
    Store(#[from] PortError),
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("No authenticated session")]
    NotAuthenticated,
    #[error("The session ended before sign-in completed")]
    SessionLost,
    #[error("Completed rituals cannot go back from {current} to {requested}")]
    RitualCountRegression { current: u32, requested: u32 },
}

/// Coarse classification used to decide how a failure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Credential,
    Unavailable,
    Other,
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::Auth(
                AuthError::InvalidCredentials
                | AuthError::EmailNotConfirmed
                | AuthError::AlreadyRegistered
                | AuthError::WeakPassword(_),
            )
            | SessionError::MissingCredentials => ErrorClass::Credential,
            SessionError::Auth(AuthError::Unavailable(_) | AuthError::RateLimited)
            | SessionError::Store(PortError::Unavailable(_)) => ErrorClass::Unavailable,
            _ => ErrorClass::Other,
        }
    }

    /// User-facing text, when a specific one exists.
    pub fn localized(&self) -> Option<&'static str> {
        let text = match self {
            SessionError::Auth(AuthError::InvalidCredentials) => {
                "Credenciais inválidas. Verifique seu email e senha."
            }
            SessionError::Auth(AuthError::EmailNotConfirmed) => {
                "Email não confirmado. Por favor verifique sua caixa de entrada."
            }
            SessionError::Auth(AuthError::AlreadyRegistered) => "Este email já está registrado.",
            SessionError::Auth(AuthError::WeakPassword(_)) => "A senha deve ter pelo menos 6 caracteres.",
            SessionError::Auth(AuthError::RateLimited) => {
                "Muitas tentativas. Aguarde um momento e tente novamente."
            }
            SessionError::MissingCredentials => "Informe seu email e sua senha.",
            SessionError::SessionLost => "Sua sessão foi encerrada durante o login. Tente novamente.",
            _ if self.class() == ErrorClass::Unavailable => {
                "Não foi possível conectar. Verifique sua conexão e tente novamente."
            }
            _ => return None,
        };
        Some(text)
    }
}

//=========================================================================================
// Manager
//=========================================================================================

struct Inner {
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    notifier: Arc<dyn Notifier>,
    snapshot: watch::Sender<SessionSnapshot>,
    /// Number of push notifications enqueued so far.
    enqueued: Arc<AtomicU64>,
}

struct SessionChange {
    seq: u64,
    event: SessionEvent,
    session: Option<Session>,
}

/// Where an observed session comes from.
#[derive(Debug, Clone, Copy)]
enum Source {
    /// The result of a call this manager made. Newer than anything already queued.
    Call,
    /// A queued push notification.
    Push(u64),
}

enum Observed {
    /// A newer observation already superseded this one.
    Stale,
    Cleared { was_signed_in: bool },
    Owner { epoch: u64, user_id: Uuid },
}

impl Observed {
    fn fetch(&self) -> Option<(u64, Uuid)> {
        match self {
            Observed::Owner { epoch, user_id } => Some((*epoch, *user_id)),
            _ => None,
        }
    }
}

/// Owns the authentication state machine. Construct once and share by `Arc`.
pub struct SessionManager {
    inner: Arc<Inner>,
    subscription: Mutex<Option<Subscription>>,
    cancel: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Creates the manager and starts listening to the provider.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::unknown());
        let enqueued = Arc::new(AtomicU64::new(0));
        let inner = Arc::new(Inner {
            auth,
            profiles,
            notifier,
            snapshot,
            enqueued: enqueued.clone(),
        });

        // The listener only enqueues. Everything it triggers runs on the pump task,
        // after the provider's callback has returned.
        let (tx, rx) = mpsc::unbounded_channel::<SessionChange>();
        let subscription = inner.auth.on_session_change(Arc::new(move |event, session| {
            let seq = enqueued.fetch_add(1, Ordering::SeqCst) + 1;
            if tx.send(SessionChange { seq, event, session }).is_err() {
                debug!(?event, "Session change arrived after shutdown");
            }
        }));

        let cancel = CancellationToken::new();
        let pump = tokio::spawn(run_pump(inner.clone(), rx, cancel.clone()));

        Self {
            inner,
            subscription: Mutex::new(Some(subscription)),
            cancel,
            pump: Mutex::new(Some(pump)),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Probes the provider for an existing session and loads its profile.
    pub async fn initialize(&self) -> SessionSnapshot {
        match self.inner.auth.get_session().await {
            Ok(Some(session)) if session.is_valid(Utc::now()) => {
                if let Some((epoch, user_id)) = self.inner.observe(Some(session), Source::Call).fetch() {
                    let result = self.inner.profiles.get_profile(user_id).await;
                    self.inner.apply_profile(epoch, user_id, result);
                }
            }
            Ok(_) => self.inner.resolve_unknown(),
            Err(e) => {
                warn!(error = %e, "Initial session probe failed");
                self.inner.resolve_unknown();
                self.inner.notifier.notify(Notice::error(
                    "Erro de conexão",
                    "Não foi possível verificar sua sessão. Entre novamente.",
                ));
            }
        }
        self.snapshot()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Landing, SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(self.inner.fail(AccountOperation::Login, SessionError::MissingCredentials));
        }

        self.inner.begin();
        let signed_in = self.inner.auth.sign_in_with_password(email.trim(), password).await;

        let SignIn { session, user } = match signed_in {
            Ok(signed_in) if signed_in.session.is_valid(Utc::now()) => signed_in,
            Ok(_) => {
                self.inner.settle();
                let err = AuthError::Unexpected("provider returned an expired session".to_string());
                return Err(self.inner.fail(AccountOperation::Login, err.into()));
            }
            Err(e) => {
                self.inner.settle();
                return Err(self.inner.fail(AccountOperation::Login, e.into()));
            }
        };

        let landing = match self.inner.observe(Some(session), Source::Call).fetch() {
            Some((epoch, user_id)) => {
                let result = self.inner.profiles.get_profile(user_id).await;
                let landing = Landing::for_profile(result.as_ref().ok());
                self.inner.apply_profile(epoch, user_id, result);
                landing
            }
            None => Landing::Onboarding,
        };
        self.inner.settle();

        // A push observed during the profile fetch may have replaced or ended this session.
        if self.snapshot().user_id() != Some(user.id) {
            return Err(self.inner.fail(AccountOperation::Login, SessionError::SessionLost));
        }

        info!(user_id = %user.id, ?landing, "Signed in");
        self.inner.notifier.notify(AccountOperation::Login.succeeded());
        Ok(landing)
    }

    /// Creates an account. The user is not signed in by this call.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SignUpOutcome, SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(self.inner.fail(AccountOperation::Register, SessionError::MissingCredentials));
        }

        self.inner.begin();
        let result = self
            .inner
            .auth
            .sign_up(email.trim(), password, display_name.trim())
            .await;
        self.inner.settle();

        match result {
            Ok(user) => {
                info!(user_id = %user.id, "Account created, awaiting confirmation");
                self.inner.notifier.notify(AccountOperation::Register.succeeded());
                Ok(SignUpOutcome::ConfirmationPending {
                    user_id: user.id,
                    email: user.email,
                })
            }
            Err(e) => Err(self.inner.fail(AccountOperation::Register, e.into())),
        }
    }

    /// Always leaves the manager `Anonymous`; a provider failure is still returned.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.inner.begin();
        let result = self.inner.auth.sign_out().await;
        self.inner.observe(None, Source::Call);

        match result {
            Ok(()) => {
                info!("Signed out");
                self.inner.notifier.notify(AccountOperation::Logout.succeeded());
                Ok(())
            }
            Err(e) => Err(self.inner.fail(AccountOperation::Logout, e.into())),
        }
    }

    /// Writes `patch` for the signed-in user and merges it into the mirror.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<ProfileUpdate, SessionError> {
        let snapshot = self.snapshot();
        let Some(user_id) = snapshot.user_id() else {
            return Err(self.inner.fail(AccountOperation::Update, SessionError::NotAuthenticated));
        };

        let current = snapshot.profile.as_ref().and_then(|p| p.completed_rituals);
        if let (Some(current), Some(requested)) = (current, patch.completed_rituals) {
            if requested < current {
                let err = SessionError::RitualCountRegression { current, requested };
                return Err(self.inner.fail(AccountOperation::Update, err));
            }
        }

        let outcome = match profile::write_patch(self.inner.profiles.as_ref(), user_id, &patch, Utc::now()).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.inner.fail(AccountOperation::Update, e.into())),
        };

        let merged = self.inner.merge_profile(user_id, &patch);
        self.inner.notifier.notify(AccountOperation::Update.succeeded());
        if outcome.history_failed() {
            self.inner.notifier.notify(Notice::warning(
                "Histórico emocional não registrado",
                "Seu humor foi salvo, mas não conseguimos registrá-lo no seu histórico.",
            ));
        }

        Ok(ProfileUpdate {
            profile: merged,
            history_recorded: !outcome.history_failed(),
        })
    }

    /// Stops listening to the provider. Also happens on drop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.unsubscribe();
        }
    }

    /// Waits for the notification pump to exit after `shutdown`.
    pub async fn join(&self) {
        let pump = self.pump.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(pump) = pump {
            if let Err(e) = pump.await {
                warn!(error = %e, "Session pump ended abnormally");
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_pump(
    inner: Arc<Inner>,
    mut changes: mpsc::UnboundedReceiver<SessionChange>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            change = changes.recv() => match change {
                Some(change) => inner.handle_change(change),
                None => break,
            },
        }
    }
    debug!("Session pump stopped");
}

impl Inner {
    fn handle_change(self: &Arc<Self>, change: SessionChange) {
        let SessionChange { seq, event, session } = change;
        let session = session.filter(|s| s.is_valid(Utc::now()));

        match self.observe(session, Source::Push(seq)) {
            Observed::Stale => debug!(?event, seq, "Ignoring superseded session change"),
            Observed::Owner { epoch, user_id } => {
                debug!(?event, %user_id, "Session change, refreshing profile");
                let inner = self.clone();
                tokio::spawn(async move {
                    let result = inner.profiles.get_profile(user_id).await;
                    inner.apply_profile(epoch, user_id, result);
                });
            }
            Observed::Cleared { was_signed_in } => {
                if was_signed_in {
                    info!(?event, "Session ended by the provider");
                    self.notifier.notify(Notice::new(
                        NoticeLevel::Info,
                        "Sessão encerrada",
                        "Sua sessão expirou. Entre novamente para continuar.",
                    ));
                }
            }
        }
    }

    /// Records the most recently observed session (last write wins).
    fn observe(&self, session: Option<Session>, source: Source) -> Observed {
        let mut observed = Observed::Stale;
        self.snapshot.send_if_modified(|snap| {
            match source {
                Source::Push(seq) if seq <= snap.seen_seq => return false,
                Source::Push(seq) => snap.seen_seq = seq,
                Source::Call => snap.seen_seq = self.enqueued.load(Ordering::SeqCst),
            }

            observed = match session {
                None => {
                    let was_signed_in = snap.is_authenticated();
                    snap.epoch += 1;
                    snap.session = None;
                    snap.profile = None;
                    snap.state = AuthState::Anonymous;
                    Observed::Cleared { was_signed_in }
                }
                Some(session) => {
                    let user_id = session.user_id;
                    if snap.user_id() != Some(user_id) {
                        snap.epoch += 1;
                        snap.profile = None;
                        snap.state = AuthState::AuthenticatedProfilePending;
                    }
                    snap.session = Some(session);
                    Observed::Owner {
                        epoch: snap.epoch,
                        user_id,
                    }
                }
            };
            true
        });
        observed
    }

    fn apply_profile(&self, epoch: u64, user_id: Uuid, result: PortResult<UserProfile>) {
        self.snapshot.send_if_modified(|snap| {
            if snap.epoch != epoch || snap.user_id() != Some(user_id) {
                debug!(%user_id, "Discarding profile of a superseded session");
                return false;
            }
            match result {
                Ok(profile) => {
                    snap.profile = Some(profile);
                    if snap.state != AuthState::Authenticating {
                        snap.state = AuthState::Authenticated;
                    }
                    true
                }
                Err(e) => {
                    warn!(%user_id, error = %e, "Profile fetch failed");
                    false
                }
            }
        });
    }

    fn merge_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> Option<UserProfile> {
        let mut merged = None;
        self.snapshot.send_if_modified(|snap| {
            if snap.user_id() != Some(user_id) {
                return false;
            }
            match snap.profile.as_mut() {
                Some(profile) => {
                    profile.apply(patch);
                    merged = Some(profile.clone());
                    true
                }
                None => false,
            }
        });
        merged
    }

    fn begin(&self) {
        self.snapshot.send_modify(|snap| snap.state = AuthState::Authenticating);
    }

    /// Leaves `Authenticating`. Newer observations that already moved the state are kept.
    fn settle(&self) {
        self.snapshot.send_if_modified(|snap| {
            if snap.state != AuthState::Authenticating {
                return false;
            }
            snap.settle();
            true
        });
    }

    fn resolve_unknown(&self) {
        self.snapshot.send_if_modified(|snap| {
            if snap.state != AuthState::Unknown {
                return false;
            }
            snap.state = AuthState::Anonymous;
            true
        });
    }

    /// Reports a failed operation to the user and hands the error back.
    fn fail(&self, operation: AccountOperation, err: SessionError) -> SessionError {
        warn!(?operation, error = %err, class = ?err.class(), "Account operation failed");
        self.notifier.notify(operation.failed(err.localized()));
        err
    }
}
