//! Auth routes — email access-code sign-in, session management.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use time::Duration;

use crate::services::{auth as auth_svc, session};
use crate::state::AppState;

const COOKIE_NAME: &str = "session_token";

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

pub(crate) fn cookie_secure() -> bool {
    env_bool("COOKIE_SECURE").unwrap_or(false)
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated profile extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user, token: token.to_owned() })
    }
}

/// Optional authentication: the session user when a valid cookie is
/// present, `None` otherwise. Voting routes use this so anonymous visitors
/// fall through to fingerprint identity instead of a 401.
pub struct MaybeAuthUser(pub Option<session::SessionUser>);

impl<S> axum::extract::FromRequestParts<S> for MaybeAuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Ok(Self(None));
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok(Self(user))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    pub email: String,
}

/// `POST /api/auth/email/request-code` — issue an access code.
pub async fn request_email_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let Some(email) = auth_svc::normalize_email(&body.email) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let code = auth_svc::request_access_code(&state.pool, &email)
        .await
        .map_err(auth_error_to_status)?;

    let Some(config) = &state.email else {
        // Development fallback: no delivery configured, hand the code back.
        tracing::warn!("returning access code in response; set RESEND_API_KEY/RESEND_FROM for delivery");
        return Ok(Json(serde_json::json!({ "ok": true, "dev_code": code })));
    };

    if let Err(e) = auth_svc::send_access_code_email(&config.api_key, &config.from, &email, &code).await {
        tracing::error!(error = %e, "access code delivery failed");
        return Err(auth_error_to_status(e));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    pub email: String,
    pub code: String,
}

/// `POST /api/auth/email/verify-code` — verify the code, create a session,
/// set the cookie, and return the signed-in profile.
pub async fn verify_email_code(
    State(state): State<AppState>,
    Json(body): Json<VerifyCodeBody>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = auth_svc::verify_access_code(&state.pool, &body.email, &body.code)
        .await
        .map_err(auth_error_to_status)?;

    let token = session::create_session(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = session::validate_session(&state.pool, &token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let secure = cookie_secure();
    let cookie = Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(secure);

    let jar = CookieJar::new().add(cookie);
    Ok((jar, Json(user)))
}

/// `GET /api/auth/me` — return current profile.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let _ = session::delete_session(&state.pool, &auth.token).await;

    let secure = cookie_secure();
    let cookie = Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO);

    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

pub(crate) fn auth_error_to_status(err: auth_svc::AuthError) -> StatusCode {
    if let auth_svc::AuthError::Db(e) = &err {
        tracing::error!(error = %e, "auth operation failed");
    }
    match err {
        auth_svc::AuthError::InvalidEmail | auth_svc::AuthError::InvalidCode => StatusCode::BAD_REQUEST,
        auth_svc::AuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
        auth_svc::AuthError::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
        auth_svc::AuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
