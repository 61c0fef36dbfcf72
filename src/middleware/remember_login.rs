use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::CookieJar;

use crate::auth::remember;
use crate::db;
use crate::session::{Session, SessionUser};
use crate::state::SharedState;

/// Runs after the session guard. If no user is logged in and a well-formed
/// remember cookie is present, attempt a single-use auto-login: the matched
/// token is deleted and replaced by a fresh pair (rotation), and any mismatch
/// deletes the selector's record and aborts silently.
pub async fn remember_login(
    State(state): State<SharedState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let outcome = match req.extensions().get::<Session>().cloned() {
        Some(session) if session.user().is_none() => match jar.get(remember::COOKIE_NAME) {
            Some(cookie) => attempt(&state, &session, cookie.value(), &user_agent).await,
            None => Outcome::Untouched,
        },
        _ => Outcome::Untouched,
    };

    let mut response = next.run(req).await;

    let cookie = match outcome {
        Outcome::Untouched => None,
        Outcome::Cleared => Some(remember::removal_cookie()),
        Outcome::Rotated(cookie) => Some(cookie),
    };
    if let Some(cookie) = cookie {
        if let Ok(value) = cookie.to_string().parse() {
            response.headers_mut().append("set-cookie", value);
        }
    }

    response
}

enum Outcome {
    Untouched,
    Cleared,
    Rotated(Cookie<'static>),
}

async fn attempt(
    state: &SharedState,
    session: &Session,
    cookie_value: &str,
    user_agent: &str,
) -> Outcome {
    let Some((selector, validator)) = remember::parse_cookie_value(cookie_value) else {
        return Outcome::Cleared;
    };

    let record = match db::remember_tokens::find_valid_by_selector(&state.pool, &selector).await {
        Ok(Some(record)) => record,
        Ok(None) => return Outcome::Cleared,
        Err(e) => {
            tracing::error!("remember token lookup failed: {e}");
            return Outcome::Untouched;
        }
    };

    if !remember::record_matches(&record, &validator, user_agent) {
        // Validator or user-agent mismatch against a known selector: treat
        // the selector as compromised.
        tracing::warn!(selector = %selector, "remember token mismatch, deleting record");
        if let Err(e) = db::remember_tokens::delete_by_selector(&state.pool, &selector).await {
            tracing::error!("failed to delete suspect remember token: {e}");
        }
        return Outcome::Cleared;
    }

    let user = match db::users::find_by_id(&state.pool, record.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            let _ = db::remember_tokens::delete_by_selector(&state.pool, &selector).await;
            return Outcome::Cleared;
        }
        Err(e) => {
            tracing::error!("user lookup for remember login failed: {e}");
            return Outcome::Untouched;
        }
    };

    // Single use: retire the matched token, then issue a replacement.
    if let Err(e) = db::remember_tokens::delete_by_selector(&state.pool, &selector).await {
        tracing::error!("failed to retire used remember token: {e}");
        return Outcome::Untouched;
    }

    let pair = match remember::issue(&state.pool, user.id, user_agent).await {
        Ok((pair, _)) => pair,
        Err(e) => {
            tracing::error!("failed to rotate remember token: {e}");
            return Outcome::Cleared;
        }
    };

    session.renew_id();
    session.set_user(SessionUser {
        id: user.id,
        email: user.email,
        username: user.username,
        firstname: user.firstname,
        lastname: user.lastname,
    });
    tracing::info!(user_id = %user.id, "auto-login via remember token");

    Outcome::Rotated(remember::cookie(&pair))
}
