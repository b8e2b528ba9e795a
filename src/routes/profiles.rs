//! Profile routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::profile;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub display_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub member_since: Option<String>,
    pub stats: profile::ProfileStats,
}

/// `GET /api/profiles/{id}` — profile with display name and activity stats.
pub async fn get_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, StatusCode> {
    let row = profile::get_profile(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let stats = profile::profile_stats(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let display_name = profile::display_name(row.first_name.as_deref(), row.last_name.as_deref(), &row.email);
    Ok(Json(ProfileResponse {
        id: row.id,
        display_name,
        first_name: row.first_name,
        last_name: row.last_name,
        email: row.email,
        member_since: row.member_since,
        stats,
    }))
}
