pub mod auth;
pub mod generate;
pub mod middleware;
pub mod rest;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
use state::AppState;

/// Builds the API routes. CORS, body limits and the Swagger UI are layered on by the binary.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route(
            "/functions/generate-message",
            post(generate::generate_message_handler),
        );

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/profile",
            get(rest::get_profile_handler).patch(rest::update_profile_handler),
        )
        .route("/dashboard", get(rest::dashboard_handler))
        .route("/messages/personalized", get(rest::personalized_message_handler))
        .route(
            "/messages/saved",
            get(rest::list_saved_messages_handler).post(rest::save_message_handler),
        )
        .route("/rituals/complete", post(rest::complete_ritual_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
