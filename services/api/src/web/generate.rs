//! services/api/src/web/generate.rs
//!
//! The generate-message function: one generated sentence per request. The
//! response body always carries a usable `message`, even on failure.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use florescer_core::domain::{
    GeneratedMessage, GenerationContext, MessageKind, Mood, QuizResult, PROGRAM_LENGTH_DAYS,
};
use florescer_core::personalization::SERVER_GENERIC_MESSAGE;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMessageRequest {
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub quiz_result: Option<String>,
    #[serde(default)]
    pub day_number: Option<u32>,
    /// `ritual` or `celia`.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub message_type: Option<MessageKind>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct GenerateMessageResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerateMessageResponse {
    fn failed(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                message: SERVER_GENERIC_MESSAGE.to_string(),
                error: Some(error.into()),
            }),
        )
    }
}

impl GenerateMessageRequest {
    fn into_context(self) -> Option<GenerationContext> {
        let mood = self.mood.as_deref().map(str::trim).filter(|m| !m.is_empty())?;
        let kind = self.message_type?;

        let day_number = self.day_number.unwrap_or(1).min(PROGRAM_LENGTH_DAYS);
        let mut context = GenerationContext::new(kind, Some(Mood::parse(mood)), day_number);
        context.quiz_result = self.quiz_result.as_deref().and_then(QuizResult::parse);
        context.user_name = self
            .user_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        Some(context)
    }
}

/// POST /functions/generate-message - Generate a personalized message
#[utoipa::path(
    post,
    path = "/functions/generate-message",
    request_body = GenerateMessageRequest,
    responses(
        (status = 200, description = "Message generated", body = GenerateMessageResponse),
        (status = 400, description = "Missing mood or message type", body = GenerateMessageResponse),
        (status = 500, description = "Generation failed, generic message returned", body = GenerateMessageResponse)
    )
)]
pub async fn generate_message_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateMessageRequest>, JsonRejection>,
) -> (StatusCode, Json<GenerateMessageResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return GenerateMessageResponse::failed(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let Some(context) = request.into_context() else {
        return GenerateMessageResponse::failed(StatusCode::BAD_REQUEST, "Missing required parameters");
    };

    match state.generator.generate(&context).await {
        Ok(raw) => {
            let message = GeneratedMessage::from_raw(&raw)
                .map(GeneratedMessage::into_string)
                .unwrap_or_else(|| SERVER_GENERIC_MESSAGE.to_string());
            (StatusCode::OK, Json(GenerateMessageResponse { message, error: None }))
        }
        Err(e) => {
            warn!(kind = context.kind.as_str(), error = %e, "Message generation failed");
            GenerateMessageResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
