//! Poll service — authoring, listing, and lifecycle of polls.
//!
//! DESIGN
//! ======
//! Polls, options, and votes live in three tables; this module owns every
//! statement touching the first two (vote casting lives in
//! `services::vote`). Multi-statement writes — create, the update
//! reconciliation, the cascade delete — run inside a single transaction so
//! a partial failure leaves no orphaned rows.
//!
//! ERROR HANDLING
//! ==============
//! Not-found and ownership outcomes are explicit variants. The single-poll
//! fetch instead returns `Ok(None)` so callers can render a missing poll
//! without an error path. Everything else propagates as `Database`.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::services::now_ms;
use crate::services::vote::{self, VoteRow};

/// Minimum number of non-empty options a poll must carry.
pub const MIN_POLL_OPTIONS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("poll not found: {0}")]
    NotFound(Uuid),
    #[error("poll not owned by requester: {0}")]
    Forbidden(Uuid),
    #[error("poll title must not be empty")]
    EmptyTitle,
    #[error("a poll needs at least {MIN_POLL_OPTIONS} options")]
    TooFewOptions,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// TYPES
// =============================================================================

/// Row from the `polls` table. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct PollRow {
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

/// Row from the `poll_options` table.
#[derive(Debug, Clone, Serialize)]
pub struct PollOptionRow {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub text: String,
    pub created_at: i64,
}

/// Attributes for a new poll.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub is_public: bool,
    pub allow_multiple_votes: bool,
    pub require_login_to_vote: bool,
    pub ends_at: Option<i64>,
}

/// Replacement attributes for an existing poll.
#[derive(Debug, Clone)]
pub struct PollUpdate {
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub allow_multiple_votes: bool,
    pub require_login_to_vote: bool,
    pub ends_at: Option<i64>,
}

/// One option as submitted by the poll form. An `id` ties it back to an
/// existing row; without one it is a new option.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedOption {
    pub id: Option<Uuid>,
    pub text: String,
}

/// A poll as returned to its author right after create/update.
#[derive(Debug, Clone, Serialize)]
pub struct AuthoredPoll {
    pub poll: PollRow,
    pub options: Vec<PollOptionRow>,
}

/// Listing entry: poll plus its options and aggregate vote count.
#[derive(Debug, Clone, Serialize)]
pub struct PollWithOptions {
    pub poll: PollRow,
    pub owner_name: String,
    pub options: Vec<PollOptionRow>,
    pub votes_count: i64,
}

/// Single-poll view with the full vote set and count breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct PollDetail {
    pub poll: PollRow,
    pub options: Vec<PollOptionRow>,
    pub votes: Vec<VoteRow>,
    pub votes_count: i64,
    pub registered_votes_count: i64,
    pub anonymous_votes_count: i64,
}

/// Total/registered/anonymous partition of a vote set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteCounts {
    pub total: i64,
    pub registered: i64,
    pub anonymous: i64,
}

// =============================================================================
// PURE HELPERS
// =============================================================================

/// Trim option texts and drop empties; order preserved.
#[must_use]
pub fn normalize_option_texts(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Trim submitted option texts and drop empties, keeping their ids.
#[must_use]
pub fn normalize_submitted_options(submitted: &[SubmittedOption]) -> Vec<SubmittedOption> {
    submitted
        .iter()
        .filter_map(|option| {
            let text = option.text.trim();
            if text.is_empty() {
                None
            } else {
                Some(SubmittedOption { id: option.id, text: text.to_owned() })
            }
        })
        .collect()
}

/// Partition a vote set by presence of a profile reference.
#[must_use]
pub fn count_votes(votes: &[VoteRow]) -> VoteCounts {
    let registered = votes.iter().filter(|vote| vote.user_id.is_some()).count() as i64;
    let total = votes.len() as i64;
    VoteCounts { total, registered, anonymous: total - registered }
}

/// Case-insensitive substring match over title and description. A blank
/// query matches everything.
#[must_use]
pub fn matches_search(poll: &PollRow, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    if poll.title.to_lowercase().contains(&needle) {
        return true;
    }
    poll.description
        .as_deref()
        .is_some_and(|description| description.to_lowercase().contains(&needle))
}

/// Countdown label for a poll card: `"2d 3h 14m left"`. Seconds appear only
/// inside the final half hour; an elapsed deadline reads `"Poll has ended"`.
#[must_use]
pub fn format_time_remaining(ends_at_ms: i64, now_ms: i64) -> String {
    let difference = ends_at_ms - now_ms;
    if difference <= 0 {
        return "Poll has ended".to_owned();
    }

    let total_seconds = difference / 1000;
    let days = total_seconds / 86_400;
    let hours = (total_seconds / 3_600) % 24;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;

    let mut remaining = String::new();
    if days > 0 {
        let _ = write!(remaining, "{days}d ");
    }
    if hours > 0 {
        let _ = write!(remaining, "{hours}h ");
    }
    if minutes > 0 {
        let _ = write!(remaining, "{minutes}m ");
    }
    if days == 0 && hours == 0 && minutes < 30 {
        let _ = write!(remaining, "{seconds}s ");
    }

    format!("{} left", remaining.trim_end())
}

/// Option reconciliation plan for a poll update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionReconciliation {
    /// Existing rows kept, with their (possibly unchanged) new text.
    pub updates: Vec<(Uuid, String)>,
    /// Texts inserted as brand-new options.
    pub inserts: Vec<String>,
    /// Existing rows absent from the submission.
    pub deletes: Vec<Uuid>,
}

/// Diff the submitted option set against the existing rows.
///
/// A submitted option whose id matches an existing row keeps that row and
/// updates its text. Each existing id can be kept at most once: a duplicate
/// (or unknown) id falls through to an insert. Existing rows kept by no
/// submission are deleted.
#[must_use]
pub fn reconcile_options(existing_ids: &[Uuid], submitted: &[SubmittedOption]) -> OptionReconciliation {
    let mut remaining: HashSet<Uuid> = existing_ids.iter().copied().collect();
    let mut plan = OptionReconciliation::default();

    for option in submitted {
        if let Some(id) = option.id {
            if remaining.remove(&id) {
                plan.updates.push((id, option.text.clone()));
                continue;
            }
        }
        plan.inserts.push(option.text.clone());
    }

    plan.deletes = existing_ids
        .iter()
        .filter(|id| remaining.contains(id))
        .copied()
        .collect();
    plan
}

// =============================================================================
// CREATE / FETCH
// =============================================================================

/// Create a poll with its options.
///
/// Validation happens before any statement runs: a blank title or fewer
/// than two non-empty option texts never reaches the database. Poll and
/// option rows are inserted in one transaction.
///
/// # Errors
///
/// Returns `EmptyTitle` / `TooFewOptions` on invalid input, or a database
/// error if an insert fails.
pub async fn create_poll(pool: &PgPool, poll: NewPoll, option_texts: &[String]) -> Result<AuthoredPoll, PollError> {
    if poll.title.trim().is_empty() {
        return Err(PollError::EmptyTitle);
    }
    let texts = normalize_option_texts(option_texts);
    if texts.len() < MIN_POLL_OPTIONS {
        return Err(PollError::TooFewOptions);
    }

    let poll_id = Uuid::new_v4();
    let created_at = now_ms();
    let row = PollRow {
        id: poll_id,
        title: poll.title.trim().to_owned(),
        description: normalize_description(poll.description),
        owner_id: poll.owner_id,
        is_public: poll.is_public,
        allow_multiple_votes: poll.allow_multiple_votes,
        require_login_to_vote: poll.require_login_to_vote,
        ends_at: poll.ends_at,
        created_at,
    };

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO polls (id, title, description, owner_id, is_public, allow_multiple_votes, require_login_to_vote, ends_at, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(row.id)
    .bind(&row.title)
    .bind(&row.description)
    .bind(row.owner_id)
    .bind(row.is_public)
    .bind(row.allow_multiple_votes)
    .bind(row.require_login_to_vote)
    .bind(row.ends_at)
    .bind(row.created_at)
    .execute(tx.as_mut())
    .await?;

    let mut options = Vec::with_capacity(texts.len());
    for text in &texts {
        let option = PollOptionRow { id: Uuid::new_v4(), poll_id, text: text.clone(), created_at };
        sqlx::query("INSERT INTO poll_options (id, poll_id, text, created_at) VALUES ($1, $2, $3, $4)")
            .bind(option.id)
            .bind(option.poll_id)
            .bind(&option.text)
            .bind(option.created_at)
            .execute(tx.as_mut())
            .await?;
        options.push(option);
    }
    tx.commit().await?;

    info!(%poll_id, options = options.len(), "poll created");
    Ok(AuthoredPoll { poll: row, options })
}

/// Fetch one poll with its options, vote rows, and count breakdown.
/// Returns `Ok(None)` if the poll does not exist.
///
/// # Errors
///
/// Returns a database error if any fetch fails.
pub async fn get_poll(pool: &PgPool, poll_id: Uuid) -> Result<Option<PollDetail>, PollError> {
    let Some(poll) = fetch_poll_row(pool, poll_id).await? else {
        return Ok(None);
    };

    let options = fetch_poll_options(pool, poll_id).await?;
    let votes = vote::list_poll_votes(pool, poll_id).await?;
    let counts = count_votes(&votes);

    Ok(Some(PollDetail {
        poll,
        options,
        votes,
        votes_count: counts.total,
        registered_votes_count: counts.registered,
        anonymous_votes_count: counts.anonymous,
    }))
}

// =============================================================================
// LISTINGS
// =============================================================================

/// List an owner's polls, newest first, with options and vote counts.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list_owner_polls(pool: &PgPool, owner_id: Uuid) -> Result<Vec<PollWithOptions>, PollError> {
    let polls = sqlx::query_as::<_, PollListingTuple>(
        "SELECT p.id, p.title, p.description, p.owner_id, p.is_public, p.allow_multiple_votes,
                p.require_login_to_vote, p.ends_at, p.created_at,
                pr.first_name, pr.last_name, pr.email
         FROM polls p
         JOIN profiles pr ON pr.id = p.owner_id
         WHERE p.owner_id = $1
         ORDER BY p.created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    attach_options_and_counts(pool, polls.into_iter().map(listing_entry).collect()).await
}

/// List public polls, newest first, with options and vote counts. A search
/// query filters on title/description after the merge.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list_public_polls(pool: &PgPool, search: Option<&str>) -> Result<Vec<PollWithOptions>, PollError> {
    let polls = sqlx::query_as::<_, PollListingTuple>(
        "SELECT p.id, p.title, p.description, p.owner_id, p.is_public, p.allow_multiple_votes,
                p.require_login_to_vote, p.ends_at, p.created_at,
                pr.first_name, pr.last_name, pr.email
         FROM polls p
         JOIN profiles pr ON pr.id = p.owner_id
         WHERE p.is_public = true
         ORDER BY p.created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut merged = attach_options_and_counts(pool, polls.into_iter().map(listing_entry).collect()).await?;
    if let Some(query) = search {
        merged.retain(|item| matches_search(&item.poll, query));
    }
    Ok(merged)
}

type PollListingTuple = (
    Uuid,
    String,
    Option<String>,
    Uuid,
    bool,
    bool,
    bool,
    Option<i64>,
    i64,
    Option<String>,
    Option<String>,
    String,
);

fn listing_entry(row: PollListingTuple) -> (PollRow, String) {
    let (
        id,
        title,
        description,
        owner_id,
        is_public,
        allow_multiple_votes,
        require_login_to_vote,
        ends_at,
        created_at,
        first_name,
        last_name,
        email,
    ) = row;
    let owner_name = crate::services::profile::display_name(first_name.as_deref(), last_name.as_deref(), &email);
    (
        PollRow {
            id,
            title,
            description,
            owner_id,
            is_public,
            allow_multiple_votes,
            require_login_to_vote,
            ends_at,
            created_at,
        },
        owner_name,
    )
}

/// Bulk-load options and vote counts for a poll set in two `IN`-list
/// queries, then merge. The empty set short-circuits.
async fn attach_options_and_counts(
    pool: &PgPool,
    polls: Vec<(PollRow, String)>,
) -> Result<Vec<PollWithOptions>, PollError> {
    if polls.is_empty() {
        return Ok(Vec::new());
    }
    let poll_ids: Vec<Uuid> = polls.iter().map(|(poll, _)| poll.id).collect();

    let mut options_by_poll: HashMap<Uuid, Vec<PollOptionRow>> = HashMap::new();
    {
        let mut builder = QueryBuilder::new(
            "SELECT id, poll_id, text, created_at FROM poll_options WHERE poll_id IN (",
        );
        {
            let mut separated = builder.separated(", ");
            for poll_id in &poll_ids {
                separated.push_bind(*poll_id);
            }
        }
        builder.push(") ORDER BY created_at ASC, id ASC");

        let rows = builder
            .build_query_as::<(Uuid, Uuid, String, i64)>()
            .fetch_all(pool)
            .await?;
        for (id, poll_id, text, created_at) in rows {
            options_by_poll
                .entry(poll_id)
                .or_default()
                .push(PollOptionRow { id, poll_id, text, created_at });
        }
    }

    let mut votes_by_poll: HashMap<Uuid, i64> = HashMap::new();
    {
        let mut builder = QueryBuilder::new("SELECT poll_id, COUNT(*) FROM votes WHERE poll_id IN (");
        {
            let mut separated = builder.separated(", ");
            for poll_id in &poll_ids {
                separated.push_bind(*poll_id);
            }
        }
        builder.push(") GROUP BY poll_id");

        let rows = builder.build_query_as::<(Uuid, i64)>().fetch_all(pool).await?;
        for (poll_id, count) in rows {
            votes_by_poll.insert(poll_id, count);
        }
    }

    Ok(polls
        .into_iter()
        .map(|(poll, owner_name)| {
            let options = options_by_poll.remove(&poll.id).unwrap_or_default();
            let votes_count = votes_by_poll.get(&poll.id).copied().unwrap_or(0);
            PollWithOptions { poll, owner_name, options, votes_count }
        })
        .collect())
}

// =============================================================================
// DELETE / UPDATE
// =============================================================================

/// Delete a poll and everything hanging off it.
///
/// Deletion order is votes, then options, then the poll row, inside one
/// transaction; the references are plain, so child-before-parent is
/// required.
///
/// # Errors
///
/// Returns `NotFound` if the poll does not exist (nothing is deleted),
/// `Forbidden` if the requester is not the owner, or a database error.
pub async fn delete_poll(pool: &PgPool, poll_id: Uuid, owner_id: Uuid) -> Result<(), PollError> {
    let Some(poll) = fetch_poll_row(pool, poll_id).await? else {
        return Err(PollError::NotFound(poll_id));
    };
    if poll.owner_id != owner_id {
        return Err(PollError::Forbidden(poll_id));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM votes WHERE poll_id = $1")
        .bind(poll_id)
        .execute(tx.as_mut())
        .await?;
    sqlx::query("DELETE FROM poll_options WHERE poll_id = $1")
        .bind(poll_id)
        .execute(tx.as_mut())
        .await?;
    sqlx::query("DELETE FROM polls WHERE id = $1")
        .bind(poll_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(%poll_id, "poll deleted");
    Ok(())
}

/// Update a poll's attributes and reconcile its option set.
///
/// Ownership is part of the lookup: a mismatch on either column reads as
/// not-found, so callers cannot distinguish someone else's poll from a
/// missing one. The attribute update and the full reconciliation run in one
/// transaction; any failure rolls everything back.
///
/// # Errors
///
/// Returns `NotFound`, validation errors, or a database error.
pub async fn update_poll(
    pool: &PgPool,
    poll_id: Uuid,
    owner_id: Uuid,
    update: PollUpdate,
    submitted: &[SubmittedOption],
) -> Result<AuthoredPoll, PollError> {
    if update.title.trim().is_empty() {
        return Err(PollError::EmptyTitle);
    }
    let submitted = normalize_submitted_options(submitted);
    if submitted.len() < MIN_POLL_OPTIONS {
        return Err(PollError::TooFewOptions);
    }

    let owned = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM polls WHERE id = $1 AND owner_id = $2")
        .bind(poll_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    if owned.is_none() {
        return Err(PollError::NotFound(poll_id));
    }

    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE polls
         SET title = $2, description = $3, is_public = $4, allow_multiple_votes = $5,
             require_login_to_vote = $6, ends_at = $7
         WHERE id = $1",
    )
    .bind(poll_id)
    .bind(update.title.trim())
    .bind(normalize_description(update.description))
    .bind(update.is_public)
    .bind(update.allow_multiple_votes)
    .bind(update.require_login_to_vote)
    .bind(update.ends_at)
    .execute(tx.as_mut())
    .await?;

    let existing_ids: Vec<Uuid> = sqlx::query_as::<_, (Uuid,)>(
        "SELECT id FROM poll_options WHERE poll_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(poll_id)
    .fetch_all(tx.as_mut())
    .await?
    .into_iter()
    .map(|(id,)| id)
    .collect();

    let plan = reconcile_options(&existing_ids, &submitted);

    for (option_id, text) in &plan.updates {
        sqlx::query("UPDATE poll_options SET text = $2 WHERE id = $1")
            .bind(*option_id)
            .bind(text)
            .execute(tx.as_mut())
            .await?;
    }

    let created_at = now_ms();
    for text in &plan.inserts {
        sqlx::query("INSERT INTO poll_options (id, poll_id, text, created_at) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(poll_id)
            .bind(text)
            .bind(created_at)
            .execute(tx.as_mut())
            .await?;
    }

    if !plan.deletes.is_empty() {
        // Votes on removed options go with them; the references are plain.
        let mut builder = QueryBuilder::new("DELETE FROM votes WHERE option_id IN (");
        {
            let mut separated = builder.separated(", ");
            for option_id in &plan.deletes {
                separated.push_bind(*option_id);
            }
        }
        builder.push(")");
        builder.build().execute(tx.as_mut()).await?;

        let mut builder = QueryBuilder::new("DELETE FROM poll_options WHERE id IN (");
        {
            let mut separated = builder.separated(", ");
            for option_id in &plan.deletes {
                separated.push_bind(*option_id);
            }
        }
        builder.push(")");
        builder.build().execute(tx.as_mut()).await?;
    }

    tx.commit().await?;
    info!(
        %poll_id,
        kept = plan.updates.len(),
        added = plan.inserts.len(),
        removed = plan.deletes.len(),
        "poll updated"
    );

    let poll = fetch_poll_row(pool, poll_id)
        .await?
        .ok_or(PollError::NotFound(poll_id))?;
    let options = fetch_poll_options(pool, poll_id).await?;
    Ok(AuthoredPoll { poll, options })
}

// =============================================================================
// HELPERS
// =============================================================================

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .as_deref()
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .map(str::to_owned)
}

pub(crate) async fn fetch_poll_row(pool: &PgPool, poll_id: Uuid) -> Result<Option<PollRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, (Uuid, String, Option<String>, Uuid, bool, bool, bool, Option<i64>, i64)>(
        "SELECT id, title, description, owner_id, is_public, allow_multiple_votes, require_login_to_vote, ends_at, created_at
         FROM polls WHERE id = $1",
    )
    .bind(poll_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(id, title, description, owner_id, is_public, allow_multiple_votes, require_login_to_vote, ends_at, created_at)| {
            PollRow {
                id,
                title,
                description,
                owner_id,
                is_public,
                allow_multiple_votes,
                require_login_to_vote,
                ends_at,
                created_at,
            }
        },
    ))
}

pub(crate) async fn fetch_poll_options(pool: &PgPool, poll_id: Uuid) -> Result<Vec<PollOptionRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String, i64)>(
        "SELECT id, poll_id, text, created_at FROM poll_options WHERE poll_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(poll_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, poll_id, text, created_at)| PollOptionRow { id, poll_id, text, created_at })
        .collect())
}

#[cfg(test)]
#[path = "poll_test.rs"]
mod tests;
