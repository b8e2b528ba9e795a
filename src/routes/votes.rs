//! Vote routes — casting and the has-voted check.
//!
//! Identity resolution happens here: a valid session wins, otherwise the
//! client-supplied fingerprint stands in. A request with neither cannot be
//! attributed and is rejected before the service is called.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routes::auth::MaybeAuthUser;
use crate::services::vote::{self, VoteError, VoteRow, VoterIdentity};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CastVoteBody {
    pub option_ids: Vec<Uuid>,
    #[serde(default)]
    pub fingerprint: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct VotedQuery {
    #[serde(default)]
    pub fingerprint: Option<Uuid>,
}

/// Acknowledgement for a cast vote. Fingerprints are not echoed back.
#[derive(Serialize)]
pub struct VoteReceipt {
    pub id: Uuid,
    pub option_id: Uuid,
    pub created_at: i64,
}

fn receipt(row: VoteRow) -> VoteReceipt {
    VoteReceipt { id: row.id, option_id: row.option_id, created_at: row.created_at }
}

/// A session always wins over a fingerprint, so a signed-in vote is never
/// attributed anonymously. Returns `None` when the request carries neither.
pub(crate) fn resolve_identity(auth: &MaybeAuthUser, fingerprint: Option<Uuid>) -> Option<VoterIdentity> {
    match &auth.0 {
        Some(user) => Some(VoterIdentity::User(user.id)),
        None => fingerprint.map(VoterIdentity::Anonymous),
    }
}

/// `POST /api/polls/{id}/votes` — cast a vote for the selected options.
pub async fn cast_vote(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    Path(poll_id): Path<Uuid>,
    Json(body): Json<CastVoteBody>,
) -> Result<(StatusCode, Json<Vec<VoteReceipt>>), StatusCode> {
    let Some(voter) = resolve_identity(&auth, body.fingerprint) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let rows = vote::cast_vote(&state.pool, poll_id, &body.option_ids, voter)
        .await
        .map_err(vote_error_to_status)?;

    Ok((StatusCode::CREATED, Json(rows.into_iter().map(receipt).collect())))
}

/// `GET /api/polls/{id}/voted` — has this voter already voted?
pub async fn has_voted(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    Path(poll_id): Path<Uuid>,
    Query(query): Query<VotedQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let Some(voter) = resolve_identity(&auth, query.fingerprint) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let voted = vote::has_voted(&state.pool, poll_id, voter)
        .await
        .map_err(vote_error_to_status)?;

    Ok(Json(serde_json::json!({ "has_voted": voted })))
}

pub(crate) fn vote_error_to_status(err: VoteError) -> StatusCode {
    if let VoteError::Database(e) = &err {
        tracing::error!(error = %e, "vote operation failed");
    }
    match err {
        VoteError::PollNotFound(_) => StatusCode::NOT_FOUND,
        VoteError::LoginRequired => StatusCode::UNAUTHORIZED,
        VoteError::PollEnded => StatusCode::CONFLICT,
        VoteError::NoSelection | VoteError::MultipleNotAllowed | VoteError::OptionNotInPoll(_) => {
            StatusCode::BAD_REQUEST
        }
        VoteError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "votes_test.rs"]
mod tests;
