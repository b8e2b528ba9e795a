//! Poll routes — authoring, listings, detail, delete.
//!
//! Handlers shape service results into the response DTOs the pages render:
//! listing entries carry option/vote counts and the countdown label, the
//! detail view adds the vote set, its registered/anonymous breakdown, and
//! per-option result tallies.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::now_ms;
use crate::services::poll::{self, AuthoredPoll, PollOptionRow, PollRow, PollWithOptions, SubmittedOption};
use crate::services::vote::{self, OptionTally, VoteRow};
use crate::state::AppState;

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct CreatePollBody {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub allow_multiple_votes: bool,
    #[serde(default)]
    pub require_login_to_vote: bool,
    #[serde(default)]
    pub ends_at: Option<i64>,
    pub options: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdatePollBody {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub allow_multiple_votes: bool,
    #[serde(default)]
    pub require_login_to_vote: bool,
    #[serde(default)]
    pub ends_at: Option<i64>,
    pub options: Vec<SubmittedOption>,
}

#[derive(Deserialize)]
pub struct PublicPollsQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct PollResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub is_public: bool,
    pub allow_multiple_votes: bool,
    pub require_login_to_vote: bool,
    pub ends_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Serialize)]
pub struct OptionResponse {
    pub id: Uuid,
    pub text: String,
    pub created_at: i64,
}

/// Vote as exposed on the detail view. The anonymous fingerprint stays
/// server-side.
#[derive(Serialize)]
pub struct VoteResponse {
    pub id: Uuid,
    pub option_id: Uuid,
    pub user_id: Option<Uuid>,
    pub created_at: i64,
}

#[derive(Serialize)]
pub struct AuthoredPollResponse {
    pub poll: PollResponse,
    pub options: Vec<OptionResponse>,
}

/// Listing entry backing a poll card.
#[derive(Serialize)]
pub struct PollSummaryResponse {
    pub poll: PollResponse,
    pub owner_name: String,
    pub options_count: usize,
    pub options: Vec<OptionResponse>,
    pub votes_count: i64,
    pub time_remaining: Option<String>,
}

/// Detail view backing the vote/stats widgets.
#[derive(Serialize)]
pub struct PollDetailResponse {
    pub poll: PollResponse,
    pub options: Vec<OptionResponse>,
    pub votes: Vec<VoteResponse>,
    pub votes_count: i64,
    pub registered_votes_count: i64,
    pub anonymous_votes_count: i64,
    pub results: Vec<OptionTally>,
    pub time_remaining: Option<String>,
}

fn poll_response(row: PollRow) -> PollResponse {
    PollResponse {
        id: row.id,
        title: row.title,
        description: row.description,
        owner_id: row.owner_id,
        is_public: row.is_public,
        allow_multiple_votes: row.allow_multiple_votes,
        require_login_to_vote: row.require_login_to_vote,
        ends_at: row.ends_at,
        created_at: row.created_at,
    }
}

fn option_response(row: PollOptionRow) -> OptionResponse {
    OptionResponse { id: row.id, text: row.text, created_at: row.created_at }
}

fn vote_response(row: VoteRow) -> VoteResponse {
    VoteResponse { id: row.id, option_id: row.option_id, user_id: row.user_id, created_at: row.created_at }
}

fn authored_response(authored: AuthoredPoll) -> AuthoredPollResponse {
    AuthoredPollResponse {
        poll: poll_response(authored.poll),
        options: authored.options.into_iter().map(option_response).collect(),
    }
}

pub(crate) fn summary_response(item: PollWithOptions, now_ms: i64) -> PollSummaryResponse {
    let time_remaining = item
        .poll
        .ends_at
        .map(|ends_at| poll::format_time_remaining(ends_at, now_ms));
    PollSummaryResponse {
        options_count: item.options.len(),
        votes_count: item.votes_count,
        owner_name: item.owner_name,
        time_remaining,
        options: item.options.into_iter().map(option_response).collect(),
        poll: poll_response(item.poll),
    }
}

pub(crate) fn detail_response(detail: poll::PollDetail, now_ms: i64) -> PollDetailResponse {
    let results = vote::tally(&detail.options, &detail.votes);
    let time_remaining = detail
        .poll
        .ends_at
        .map(|ends_at| poll::format_time_remaining(ends_at, now_ms));
    PollDetailResponse {
        results,
        time_remaining,
        votes_count: detail.votes_count,
        registered_votes_count: detail.registered_votes_count,
        anonymous_votes_count: detail.anonymous_votes_count,
        options: detail.options.into_iter().map(option_response).collect(),
        votes: detail.votes.into_iter().map(vote_response).collect(),
        poll: poll_response(detail.poll),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/polls` — create a poll with options.
pub async fn create_poll(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreatePollBody>,
) -> Result<(StatusCode, Json<AuthoredPollResponse>), StatusCode> {
    let new_poll = poll::NewPoll {
        title: body.title,
        description: body.description,
        owner_id: auth.user.id,
        is_public: body.is_public,
        allow_multiple_votes: body.allow_multiple_votes,
        require_login_to_vote: body.require_login_to_vote,
        ends_at: body.ends_at,
    };

    let created = poll::create_poll(&state.pool, new_poll, &body.options)
        .await
        .map_err(poll_error_to_status)?;

    Ok((StatusCode::CREATED, Json(authored_response(created))))
}

/// `GET /api/polls` — list the caller's polls.
pub async fn list_my_polls(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<PollSummaryResponse>>, StatusCode> {
    let items = poll::list_owner_polls(&state.pool, auth.user.id)
        .await
        .map_err(poll_error_to_status)?;

    let now = now_ms();
    Ok(Json(items.into_iter().map(|item| summary_response(item, now)).collect()))
}

/// `GET /api/polls/public` — list public polls, optionally filtered.
pub async fn list_public_polls(
    State(state): State<AppState>,
    Query(query): Query<PublicPollsQuery>,
) -> Result<Json<Vec<PollSummaryResponse>>, StatusCode> {
    let items = poll::list_public_polls(&state.pool, query.q.as_deref())
        .await
        .map_err(poll_error_to_status)?;

    let now = now_ms();
    Ok(Json(items.into_iter().map(|item| summary_response(item, now)).collect()))
}

/// `GET /api/polls/{id}` — poll detail with votes, counts, and tallies.
pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<Json<PollDetailResponse>, StatusCode> {
    let detail = poll::get_poll(&state.pool, poll_id)
        .await
        .map_err(poll_error_to_status)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(detail_response(detail, now_ms())))
}

/// `PATCH /api/polls/{id}` — update attributes and reconcile options.
pub async fn update_poll(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(poll_id): Path<Uuid>,
    Json(body): Json<UpdatePollBody>,
) -> Result<Json<AuthoredPollResponse>, StatusCode> {
    let update = poll::PollUpdate {
        title: body.title,
        description: body.description,
        is_public: body.is_public,
        allow_multiple_votes: body.allow_multiple_votes,
        require_login_to_vote: body.require_login_to_vote,
        ends_at: body.ends_at,
    };

    let revised = poll::update_poll(&state.pool, poll_id, auth.user.id, update, &body.options)
        .await
        .map_err(poll_error_to_status)?;

    Ok(Json(authored_response(revised)))
}

/// `DELETE /api/polls/{id}` — delete a poll and its votes/options.
pub async fn delete_poll(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(poll_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    poll::delete_poll(&state.pool, poll_id, auth.user.id)
        .await
        .map_err(poll_error_to_status)?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

pub(crate) fn poll_error_to_status(err: poll::PollError) -> StatusCode {
    if let poll::PollError::Database(e) = &err {
        tracing::error!(error = %e, "poll operation failed");
    }
    match err {
        poll::PollError::NotFound(_) => StatusCode::NOT_FOUND,
        poll::PollError::Forbidden(_) => StatusCode::FORBIDDEN,
        poll::PollError::EmptyTitle | poll::PollError::TooFewOptions => StatusCode::BAD_REQUEST,
        poll::PollError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "polls_test.rs"]
mod tests;
