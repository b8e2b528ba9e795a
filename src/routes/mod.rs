//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds all HTTP endpoints under a single Axum router. The service is a
//! JSON API only; pages live in whatever client consumes it.

pub mod auth;
pub mod polls;
pub mod profiles;
pub mod votes;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/email/request-code", post(auth::request_email_code))
        .route("/api/auth/email/verify-code", post(auth::verify_email_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/polls", get(polls::list_my_polls).post(polls::create_poll))
        .route("/api/polls/public", get(polls::list_public_polls))
        .route(
            "/api/polls/{id}",
            get(polls::get_poll)
                .patch(polls::update_poll)
                .delete(polls::delete_poll),
        )
        .route("/api/polls/{id}/votes", post(votes::cast_vote))
        .route("/api/polls/{id}/voted", get(votes::has_voted))
        .route("/api/profiles/{id}", get(profiles::get_profile))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
