//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the profile, messages and rituals endpoints
//! and the master definition for the OpenAPI specification.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use florescer_core::domain::{GenerationContext, MessageKind, Mood, ProfilePatch, QuizResult, UserProfile};
use florescer_core::ports::PortError;
use florescer_core::profile;
use florescer_core::program::{self, Completion, RitualProgress, SaveOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::generate::{GenerateMessageRequest, GenerateMessageResponse};
use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::generate::generate_message_handler,
        get_profile_handler,
        update_profile_handler,
        dashboard_handler,
        personalized_message_handler,
        list_saved_messages_handler,
        save_message_handler,
        complete_ritual_handler,
    ),
    components(
        schemas(
            SignupRequest, LoginRequest, AuthResponse,
            GenerateMessageRequest, GenerateMessageResponse,
            ProfileResponse, UpdateProfileRequest, UpdateProfileResponse, DashboardResponse,
            PersonalizedMessageResponse, SaveMessageRequest, SaveMessageResponse, RitualCompletionResponse
        )
    ),
    tags(
        (name = "Florescer API", description = "Accounts, profile, rituals and personalized messages for the 21-day program.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub mood: Option<String>,
    pub quiz_result: Option<String>,
    pub completed_rituals: u32,
    /// Current day of the program, 1 to 21.
    pub day: u32,
    pub total_days: u32,
    /// `true` when today's ritual has already been counted.
    pub completed_today: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        let progress = RitualProgress::for_profile(&profile, Utc::now().date_naive());
        Self {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            mood: profile.mood.map(String::from),
            quiz_result: profile.quiz_result.map(|q| q.as_str().to_string()),
            completed_rituals: progress.completed_rituals,
            day: progress.day,
            total_days: progress.total_days,
            completed_today: progress.completed_today,
            created_at: profile.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub mood: Option<String>,
    /// One of `A`, `B`, `C`, `D`.
    pub quiz_result: Option<String>,
    pub completed_rituals: Option<u32>,
}

impl UpdateProfileRequest {
    fn into_patch(self) -> Result<ProfilePatch, String> {
        let quiz_result = match self.quiz_result.as_deref() {
            Some(raw) => Some(QuizResult::parse(raw).ok_or_else(|| format!("Unknown quiz result '{}'", raw))?),
            None => None,
        };
        let mood = match self.mood.as_deref().map(str::trim) {
            Some("") => return Err("Mood cannot be empty".to_string()),
            Some(raw) => Some(Mood::parse(raw)),
            None => None,
        };
        Ok(ProfilePatch {
            full_name: self.full_name,
            mood,
            quiz_result,
            completed_rituals: self.completed_rituals,
            last_ritual_on: None,
        })
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileResponse {
    pub profile: ProfileResponse,
    /// `false` when the mood was saved but its history entry was not.
    pub history_recorded: bool,
}

#[derive(Deserialize)]
pub struct PersonalizedMessageQuery {
    pub kind: MessageKind,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PersonalizedMessageResponse {
    pub kind: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub profile: ProfileResponse,
    pub ritual_message: String,
    pub celia_message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveMessageRequest {
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SaveMessageResponse {
    /// `saved` or `already_saved`.
    pub outcome: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RitualCompletionResponse {
    /// `false` when today's ritual was already counted or the program is over.
    pub recorded: bool,
    pub completed_rituals: u32,
    pub day: u32,
    /// `true` once all 21 rituals are done. Further completions are not counted.
    pub finished: bool,
}

fn port_error(e: PortError, action: &str) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Conflict(why) => (StatusCode::CONFLICT, why),
        PortError::Unavailable(_) => {
            error!("{} failed: {}", action, e);
            (StatusCode::SERVICE_UNAVAILABLE, format!("{} is temporarily unavailable", action))
        }
        PortError::Unexpected(_) => {
            error!("{} failed: {}", action, e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{} failed", action))
        }
    }
}

//=========================================================================================
// Profile Handlers
//=========================================================================================

/// Get the signed-in user's profile and program day.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The user's profile", body = ProfileResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let profile = state
        .profiles
        .get_profile(user_id)
        .await
        .map_err(|e| port_error(e, "Loading the profile"))?;
    Ok(Json(profile.into()))
}

/// Partially update the signed-in user's profile.
///
/// A mood in the patch is also appended to the emotional history. A failed
/// history append does not undo the profile update.
#[utoipa::path(
    patch,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UpdateProfileResponse),
        (status = 400, description = "Invalid patch"),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "Completed rituals would decrease")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, (StatusCode, String)> {
    let patch = req.into_patch().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    if patch.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Nothing to update".to_string()));
    }

    let outcome = profile::write_patch(state.profiles.as_ref(), user_id, &patch, Utc::now())
        .await
        .map_err(|e| port_error(e, "Updating the profile"))?;

    let updated = state
        .profiles
        .get_profile(user_id)
        .await
        .map_err(|e| port_error(e, "Loading the profile"))?;

    Ok(Json(UpdateProfileResponse {
        profile: updated.into(),
        history_recorded: !outcome.history_failed(),
    }))
}

//=========================================================================================
// Message Handlers
//=========================================================================================

async fn context_for(state: &AppState, user_id: Uuid, kind: MessageKind) -> GenerationContext {
    match state.profiles.get_profile(user_id).await {
        Ok(profile) => GenerationContext::for_profile(kind, &profile),
        Err(e) => {
            warn!(%user_id, error = %e, "Profile unavailable, personalizing without it");
            GenerationContext::new(kind, None, 1)
        }
    }
}

/// Get a personalized message of the given kind. Always answers with a message.
#[utoipa::path(
    get,
    path = "/messages/personalized",
    params(
        ("kind" = String, Query, description = "`ritual` or `celia`")
    ),
    responses(
        (status = 200, description = "A personalized or fallback message", body = PersonalizedMessageResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn personalized_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<PersonalizedMessageQuery>,
) -> Json<PersonalizedMessageResponse> {
    let context = context_for(&state, user_id, query.kind).await;
    let message = state.personalizer.personalize(&context).await;
    Json(PersonalizedMessageResponse {
        kind: query.kind.as_str().to_string(),
        message: message.into_string(),
    })
}

/// Everything the dashboard shows: profile, program day and both daily messages.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard content", body = DashboardResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<DashboardResponse>, (StatusCode, String)> {
    let profile = state
        .profiles
        .get_profile(user_id)
        .await
        .map_err(|e| port_error(e, "Loading the profile"))?;

    let ritual = GenerationContext::for_profile(MessageKind::Ritual, &profile);
    let celia = GenerationContext::for_profile(MessageKind::Celia, &profile);
    let (ritual_message, celia_message) = futures::join!(
        state.personalizer.personalize(&ritual),
        state.personalizer.personalize(&celia),
    );

    Ok(Json(DashboardResponse {
        profile: profile.into(),
        ritual_message: ritual_message.into_string(),
        celia_message: celia_message.into_string(),
    }))
}

/// List the user's saved messages, oldest first.
#[utoipa::path(
    get,
    path = "/messages/saved",
    responses(
        (status = 200, description = "Saved messages", body = [String]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_saved_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let messages = state
        .profiles
        .list_saved_messages(user_id)
        .await
        .map_err(|e| port_error(e, "Loading saved messages"))?;
    Ok(Json(messages))
}

/// Save a message to the user's favourites. Saving it again is a no-op.
#[utoipa::path(
    post,
    path = "/messages/saved",
    request_body = SaveMessageRequest,
    responses(
        (status = 201, description = "Message saved", body = SaveMessageResponse),
        (status = 200, description = "Message was already saved", body = SaveMessageResponse),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn save_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<SaveMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message cannot be empty".to_string()));
    }

    let outcome = program::save_message(state.profiles.as_ref(), user_id, &req.message)
        .await
        .map_err(|e| port_error(e, "Saving the message"))?;

    let (status, outcome) = match outcome {
        SaveOutcome::Saved => (StatusCode::CREATED, "saved"),
        SaveOutcome::AlreadySaved => (StatusCode::OK, "already_saved"),
    };
    Ok((status, Json(SaveMessageResponse { outcome: outcome.to_string() })))
}

//=========================================================================================
// Ritual Handlers
//=========================================================================================

/// Mark today's ritual as done. A second completion on the same day is not counted.
#[utoipa::path(
    post,
    path = "/rituals/complete",
    responses(
        (status = 200, description = "Progress after the completion", body = RitualCompletionResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn complete_ritual_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<RitualCompletionResponse>, (StatusCode, String)> {
    let profile = state
        .profiles
        .get_profile(user_id)
        .await
        .map_err(|e| port_error(e, "Loading the profile"))?;

    let today = Utc::now().date_naive();
    let mut progress = RitualProgress::for_profile(&profile, today);
    let recorded = match progress.complete() {
        Completion::Completed { next_day } => {
            let patch = ProfilePatch {
                completed_rituals: Some(progress.completed_rituals),
                last_ritual_on: Some(today),
                ..ProfilePatch::default()
            };
            profile::write_patch(state.profiles.as_ref(), user_id, &patch, Utc::now())
                .await
                .map_err(|e| port_error(e, "Recording the ritual"))?;
            info!(%user_id, completed = progress.completed_rituals, next_day, "Ritual completed");
            true
        }
        Completion::AlreadyCompleted => {
            debug!(%user_id, "Ritual already completed today");
            false
        }
        Completion::Finished => {
            debug!(%user_id, "Program already finished");
            false
        }
    };

    Ok(Json(RitualCompletionResponse {
        recorded,
        completed_rituals: progress.completed_rituals,
        day: progress.day,
        finished: progress.is_finished(),
    }))
}
