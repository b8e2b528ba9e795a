//! Vote service — casting, duplicate checks, and result tallies.
//!
//! DESIGN
//! ======
//! Voter identity has exactly two shapes: an authenticated profile id or an
//! anonymous client fingerprint. A vote row records one of them, never
//! both, and the has-voted check matches on whichever shape the caller
//! presents. Casting validates against the poll's settings, then inserts
//! every selected option's row in a single transaction: all land or none
//! do.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::services::now_ms;
use crate::services::poll::{self, PollOptionRow};

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("poll not found: {0}")]
    PollNotFound(Uuid),
    #[error("poll requires login to vote")]
    LoginRequired,
    #[error("poll has ended")]
    PollEnded,
    #[error("no option selected")]
    NoSelection,
    #[error("poll does not allow selecting multiple options")]
    MultipleNotAllowed,
    #[error("option does not belong to poll: {0}")]
    OptionNotInPoll(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Who is casting or checking a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterIdentity {
    /// Authenticated profile.
    User(Uuid),
    /// Anonymous visitor, identified by a client-generated fingerprint.
    Anonymous(Uuid),
}

impl VoterIdentity {
    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> Option<Uuid> {
        match self {
            Self::User(_) => None,
            Self::Anonymous(fingerprint) => Some(*fingerprint),
        }
    }
}

/// Row from the `votes` table. Exactly one of `user_id` /
/// `voter_fingerprint` is set by this service.
#[derive(Debug, Clone, Serialize)]
pub struct VoteRow {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Option<Uuid>,
    pub voter_fingerprint: Option<Uuid>,
    pub created_at: i64,
}

/// Per-option result line for the stats view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptionTally {
    pub option_id: Uuid,
    pub text: String,
    pub votes: i64,
    pub percentage: f64,
}

// =============================================================================
// PURE HELPERS
// =============================================================================

/// True once the poll's deadline has elapsed.
#[must_use]
pub fn poll_closed(ends_at: Option<i64>, now_ms: i64) -> bool {
    ends_at.is_some_and(|ends_at| ends_at <= now_ms)
}

/// Per-option counts and share of the total, one-decimal precision.
/// A zero total yields 0.0% everywhere.
#[must_use]
pub fn tally(options: &[PollOptionRow], votes: &[VoteRow]) -> Vec<OptionTally> {
    let total = votes.len();
    options
        .iter()
        .map(|option| {
            let count = votes.iter().filter(|vote| vote.option_id == option.id).count();
            let percentage = if total == 0 {
                0.0
            } else {
                ((count as f64 / total as f64) * 1000.0).round() / 10.0
            };
            OptionTally {
                option_id: option.id,
                text: option.text.clone(),
                votes: count as i64,
                percentage,
            }
        })
        .collect()
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Cast a vote for the selected options.
///
/// Validation order: the poll must exist, anonymous voters are rejected on
/// login-required polls, the deadline must not have passed, at least one
/// option must be selected (duplicates collapse), single-select polls take
/// exactly one, and every selection must belong to the poll. All rows are
/// inserted in one transaction.
///
/// # Errors
///
/// Returns the matching validation variant, or a database error.
pub async fn cast_vote(
    pool: &PgPool,
    poll_id: Uuid,
    option_ids: &[Uuid],
    voter: VoterIdentity,
) -> Result<Vec<VoteRow>, VoteError> {
    let Some(poll) = poll::fetch_poll_row(pool, poll_id).await? else {
        return Err(VoteError::PollNotFound(poll_id));
    };
    if poll.require_login_to_vote && voter.user_id().is_none() {
        return Err(VoteError::LoginRequired);
    }
    if poll_closed(poll.ends_at, now_ms()) {
        return Err(VoteError::PollEnded);
    }

    let mut selected: Vec<Uuid> = Vec::with_capacity(option_ids.len());
    for option_id in option_ids {
        if !selected.contains(option_id) {
            selected.push(*option_id);
        }
    }
    if selected.is_empty() {
        return Err(VoteError::NoSelection);
    }
    if !poll.allow_multiple_votes && selected.len() > 1 {
        return Err(VoteError::MultipleNotAllowed);
    }

    let valid: HashSet<Uuid> = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM poll_options WHERE poll_id = $1")
        .bind(poll_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|(id,)| id)
        .collect();
    for option_id in &selected {
        if !valid.contains(option_id) {
            return Err(VoteError::OptionNotInPoll(*option_id));
        }
    }

    let created_at = now_ms();
    let mut rows = Vec::with_capacity(selected.len());
    let mut tx = pool.begin().await?;
    for option_id in &selected {
        let row = VoteRow {
            id: Uuid::new_v4(),
            poll_id,
            option_id: *option_id,
            user_id: voter.user_id(),
            voter_fingerprint: voter.fingerprint(),
            created_at,
        };
        sqlx::query(
            "INSERT INTO votes (id, poll_id, option_id, user_id, voter_fingerprint, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(row.id)
        .bind(row.poll_id)
        .bind(row.option_id)
        .bind(row.user_id)
        .bind(row.voter_fingerprint)
        .bind(row.created_at)
        .execute(tx.as_mut())
        .await?;
        rows.push(row);
    }
    tx.commit().await?;

    info!(%poll_id, count = rows.len(), registered = voter.user_id().is_some(), "vote cast");
    Ok(rows)
}

/// True iff at least one vote row matches the poll and the voter identity.
///
/// # Errors
///
/// Returns a database error if the count query fails.
pub async fn has_voted(pool: &PgPool, poll_id: Uuid, voter: VoterIdentity) -> Result<bool, VoteError> {
    let count: i64 = match voter {
        VoterIdentity::User(user_id) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = $1 AND user_id = $2")
                .bind(poll_id)
                .bind(user_id)
                .fetch_one(pool)
                .await?
        }
        VoterIdentity::Anonymous(fingerprint) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = $1 AND voter_fingerprint = $2")
                .bind(poll_id)
                .bind(fingerprint)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count > 0)
}

/// All vote rows for a poll, oldest first.
pub(crate) async fn list_poll_votes(pool: &PgPool, poll_id: Uuid) -> Result<Vec<VoteRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid, Option<Uuid>, Option<Uuid>, i64)>(
        "SELECT id, poll_id, option_id, user_id, voter_fingerprint, created_at
         FROM votes WHERE poll_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(poll_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, poll_id, option_id, user_id, voter_fingerprint, created_at)| VoteRow {
            id,
            poll_id,
            option_id,
            user_id,
            voter_fingerprint,
            created_at,
        })
        .collect())
}

#[cfg(test)]
#[path = "vote_test.rs"]
mod tests;
