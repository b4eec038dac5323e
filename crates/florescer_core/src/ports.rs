//! crates/florescer_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted auth provider, the profile store and the
//! text-generation endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AuthUser, EmotionalRecord, GenerationContext, ProfilePatch, Session, UserCredentials,
    UserProfile,
};
use crate::events::{SessionListener, Subscription};
use crate::notify::Notice;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for storage and generation port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The write would break a rule the stored row enforces.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Errors reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Email not confirmed")]
    EmailNotConfirmed,
    #[error("User already registered")]
    AlreadyRegistered,
    #[error("Password rejected: {0}")]
    WeakPassword(String),
    #[error("Too many requests")]
    RateLimited,
    #[error("Auth provider unavailable: {0}")]
    Unavailable(String),
    #[error("Unexpected auth provider error: {0}")]
    Unexpected(String),
}

/// What a successful sign-in hands back.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub session: Session,
    pub user: AuthUser,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The identity service issuing sessions from email and password.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignIn, AuthError>;

    /// Creates a new identity. The account may still need out-of-band confirmation.
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<AuthUser, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Returns the session currently held by the provider, if any.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Registers a push listener for session changes.
    ///
    /// Implementations may invoke the listener synchronously from inside their own
    /// calls, so listeners must not call back into the provider.
    fn on_session_change(&self, listener: SessionListener) -> Subscription;
}

/// The remote row store holding profiles and their auxiliary tables.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile>;

    /// Applies `patch`. Fails with `Conflict`, writing nothing, when it would lower
    /// the stored `completed_rituals`.
    async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> PortResult<()>;

    async fn insert_emotional_history(&self, record: &EmotionalRecord) -> PortResult<()>;

    async fn list_saved_messages(&self, user_id: Uuid) -> PortResult<Vec<String>>;

    async fn insert_saved_message(&self, user_id: Uuid, message: &str) -> PortResult<()>;
}

#[async_trait]
pub trait MessageGenerationService: Send + Sync {
    /// Generates one short message for the given context.
    async fn generate(&self, context: &GenerationContext) -> PortResult<String>;
}

/// Account storage used by the backend to implement email/password auth.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Creates the user and its empty profile row.
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> Result<AuthUser, AuthError>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// The uniform transient notification channel ("toast").
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
