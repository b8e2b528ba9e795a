//! Profile service — profile fetch, display names, aggregate stats.

use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Profile row as exposed by the API. `member_since` is pre-formatted in
/// SQL so the created-at timestamptz never crosses the decode boundary.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub member_since: Option<String>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ProfileStats {
    pub polls_created: i64,
    pub votes_cast: i64,
}

/// Human-readable name: "First Last", either half alone, or the email
/// local part when no name was ever set.
#[must_use]
pub fn display_name(first_name: Option<&str>, last_name: Option<&str>, email: &str) -> String {
    let first = first_name.map(str::trim).filter(|s| !s.is_empty());
    let last = last_name.map(str::trim).filter(|s| !s.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => format!("{first} {last}"),
        (Some(first), None) => first.to_owned(),
        (None, Some(last)) => last.to_owned(),
        (None, None) => email
            .split('@')
            .next()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("user")
            .to_owned(),
    }
}

/// Fetch one profile.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT id, first_name, last_name, email,
                 to_char(created_at, 'YYYY-MM-DD') AS member_since
          FROM profiles WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Profile {
        id: r.get("id"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        email: r.get("email"),
        member_since: r.get("member_since"),
    }))
}

/// Aggregate activity counters shown on a profile.
///
/// # Errors
///
/// Returns a database error if a count query fails.
pub async fn profile_stats(pool: &PgPool, user_id: Uuid) -> Result<ProfileStats, sqlx::Error> {
    let polls_created: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM polls WHERE owner_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let votes_cast: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(ProfileStats { polls_created, votes_cast })
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
