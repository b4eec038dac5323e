//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use florescer_core::ports::{AuthError, PortError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::session_cookie;
use crate::web::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_DAYS: i64 = 30;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.as_ref().is_some_and(|re| re.is_match(email))
}

fn session_cookie_header(auth_session_id: &str, max_age_seconds: i64) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id, max_age_seconds
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
///
/// The account and its empty profile are created together. No session is
/// issued: the user signs in afterwards.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid email or password too short"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create user and profile
    let user = state
        .accounts
        .create_user_with_email(&email, &password_hash, &req.full_name)
        .await
        .map_err(|e| match e {
            AuthError::AlreadyRegistered => (StatusCode::CONFLICT, "Email already registered".to_string()),
            _ => {
                error!("Failed to create user: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
            }
        })?;

    info!(user_id = %user.id, "Account created");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            email: user.email,
        }),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(invalid());
    }

    // 1. Get user by email
    let user_creds = state
        .accounts
        .get_user_by_email(&normalize_email(&req.email))
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid(),
            _ => {
                error!("Failed to get user: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
            }
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    // 3. Create the auth session
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .accounts
        .create_auth_session(&auth_session_id, user_creds.user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;

    // 4. Return response with cookie
    let cookie = session_cookie_header(&auth_session_id, Duration::days(SESSION_DAYS).num_seconds());
    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id =
        session_cookie(&headers).ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .accounts
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, session_cookie_header("", 0))]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::{json_request, read_json, test_app, InMemoryBackend};
    use axum::http::Request;
    use axum::body::Body;
    use tower::ServiceExt;

    #[test]
    fn email_validation_rejects_obvious_garbage() {
        assert!(is_valid_email("ana@example.com"));
        assert!(!is_valid_email("ana.example.com"));
        assert!(!is_valid_email("ana@ex ample.com"));
    }

    #[tokio::test]
    async fn signup_creates_profile_without_signing_in() {
        let backend = InMemoryBackend::new();
        let app = test_app(backend.clone());

        let response = app
            .oneshot(json_request(
                "POST",
                "/auth/signup",
                r#"{"email":" Ana@Example.com ","password":"segredo1","full_name":"Ana Souza"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body: AuthResponse = read_json(response).await;
        assert_eq!(body.email, "ana@example.com");
        let profile = backend.profile(body.user_id).unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ana Souza"));
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let backend = InMemoryBackend::new();
        let body = r#"{"email":"ana@example.com","password":"segredo1","full_name":"Ana"}"#;

        let first = test_app(backend.clone())
            .oneshot(json_request("POST", "/auth/signup", body))
            .await
            .unwrap();
        let second = test_app(backend)
            .oneshot(json_request("POST", "/auth/signup", body))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_storage() {
        let backend = InMemoryBackend::new();

        let response = test_app(backend.clone())
            .oneshot(json_request(
                "POST",
                "/auth/signup",
                r#"{"email":"ana@example.com","password":"123","full_name":"Ana"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(backend.user_count(), 0);
    }

    #[tokio::test]
    async fn login_sets_cookie_and_logout_clears_it() {
        let backend = InMemoryBackend::new();
        test_app(backend.clone())
            .oneshot(json_request(
                "POST",
                "/auth/signup",
                r#"{"email":"ana@example.com","password":"segredo1","full_name":"Ana"}"#,
            ))
            .await
            .unwrap();

        let login = test_app(backend.clone())
            .oneshot(json_request(
                "POST",
                "/auth/login",
                r#"{"email":"ana@example.com","password":"segredo1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        let cookie = login
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.contains("Max-Age=2592000"));
        assert_eq!(backend.session_count(), 1);

        let session = cookie.split(';').next().unwrap().to_string();
        let logout = test_app(backend.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(header::COOKIE, session)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(logout.status(), StatusCode::OK);
        assert!(logout.headers()[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));
        assert_eq!(backend.session_count(), 0);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let backend = InMemoryBackend::new();
        test_app(backend.clone())
            .oneshot(json_request(
                "POST",
                "/auth/signup",
                r#"{"email":"ana@example.com","password":"segredo1","full_name":"Ana"}"#,
            ))
            .await
            .unwrap();

        let login = test_app(backend.clone())
            .oneshot(json_request(
                "POST",
                "/auth/login",
                r#"{"email":"ana@example.com","password":"errada99"}"#,
            ))
            .await
            .unwrap();
        let unknown = test_app(backend)
            .oneshot(json_request(
                "POST",
                "/auth/login",
                r#"{"email":"bia@example.com","password":"segredo1"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    }
}
