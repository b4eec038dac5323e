//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `ProfileStore` and `AccountRepository` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use florescer_core::domain::{
    AuthUser, EmotionalRecord, Mood, ProfilePatch, QuizResult, UserCredentials, UserProfile,
};
use florescer_core::ports::{AccountRepository, AuthError, PortError, PortResult, ProfileStore};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

/// Postgres error code for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    email: String,
    full_name: Option<String>,
    mood: Option<String>,
    quiz_result: Option<String>,
    completed_rituals: i32,
    last_ritual_on: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        let quiz_result = self.quiz_result.as_deref().and_then(|raw| {
            let parsed = QuizResult::parse(raw);
            if parsed.is_none() {
                warn!(user_id = %self.id, quiz_result = raw, "Ignoring unknown quiz result");
            }
            parsed
        });
        UserProfile {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            mood: self.mood.as_deref().map(Mood::parse),
            quiz_result,
            completed_rituals: Some(u32::try_from(self.completed_rituals).unwrap_or(0)),
            last_ritual_on: self.last_ritual_on,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

impl UserRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct SavedMessageRecord {
    message: String,
}

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for DbAdapter {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, email, full_name, mood, quiz_result, completed_rituals, last_ritual_on, created_at
             FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Profile {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> PortResult<()> {
        let completed_rituals = patch
            .completed_rituals
            .map(i32::try_from)
            .transpose()
            .map_err(|_| PortError::Unexpected("completed_rituals out of range".to_string()))?;

        // The ritual count check runs in the same statement as the write.
        let result = sqlx::query(
            "UPDATE profiles SET
                full_name = COALESCE($2, full_name),
                mood = COALESCE($3, mood),
                quiz_result = COALESCE($4, quiz_result),
                completed_rituals = COALESCE($5, completed_rituals),
                last_ritual_on = COALESCE($6, last_ritual_on)
             WHERE id = $1 AND ($5::INTEGER IS NULL OR completed_rituals <= $5)",
        )
        .bind(user_id)
        .bind(patch.full_name.as_deref())
        .bind(patch.mood.as_ref().map(|m| m.as_str().to_string()))
        .bind(patch.quiz_result.map(|q| q.as_str()))
        .bind(completed_rituals)
        .bind(patch.last_ritual_on)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing matched: either the row is missing or the guard refused the write.
        let current: Option<i32> = sqlx::query_scalar("SELECT completed_rituals FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match (current, completed_rituals) {
            (Some(current), Some(requested)) => Err(PortError::Conflict(format!(
                "Completed rituals cannot go back from {} to {}",
                current, requested
            ))),
            _ => Err(PortError::NotFound(format!("Profile {} not found", user_id))),
        }
    }

    async fn insert_emotional_history(&self, record: &EmotionalRecord) -> PortResult<()> {
        sqlx::query("INSERT INTO emotional_history (id, user_id, mood, recorded_at) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(record.user_id)
            .bind(record.mood.as_str())
            .bind(record.recorded_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_saved_messages(&self, user_id: Uuid) -> PortResult<Vec<String>> {
        let records = sqlx::query_as::<_, SavedMessageRecord>(
            "SELECT message FROM saved_messages WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.message).collect())
    }

    async fn insert_saved_message(&self, user_id: Uuid, message: &str) -> PortResult<()> {
        // A concurrent save of the same message is not an error.
        sqlx::query(
            "INSERT INTO saved_messages (id, user_id, message) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, message) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `AccountRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountRepository for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> Result<AuthUser, AuthError> {
        let user_id = Uuid::new_v4();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        sqlx::query("INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(email)
            .bind(hashed_password)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuthError::AlreadyRegistered
                } else {
                    AuthError::Unexpected(e.to_string())
                }
            })?;

        let full_name = Some(full_name.trim()).filter(|name| !name.is_empty());
        sqlx::query("INSERT INTO profiles (id, email, full_name) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(email)
            .bind(full_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthError::Unexpected(e.to_string()))?;

        tx.commit().await.map_err(|e| AuthError::Unexpected(e.to_string()))?;

        Ok(AuthUser {
            id: user_id,
            email: email.to_string(),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User with email {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Uuid = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
