use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use crate::session::{self, FlashLevel, Session};
use crate::state::SharedState;

/// Runs before routing on every request: loads the session from its cookie,
/// enforces the idle timeout, rotates the session id on schedule, and
/// persists the session plus cookie once the handler is done.
pub async fn session_guard(
    State(state): State<SharedState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let now = Utc::now().timestamp();

    let session = match load(&state, &jar).await {
        Some(session) => {
            if now - session.last_activity() > state.config.session_idle_secs {
                // Idle too long: everything goes, bar one notice.
                session.invalidate();
                session.flash(FlashLevel::Notice, "You were logged out due to inactivity.");
            } else {
                session.touch(now);
                if now - session.created_at() > state.config.session_rotate_secs {
                    session.renew_id();
                }
            }
            session
        }
        None => Session::fresh(now),
    };

    req.extensions_mut().insert(session.clone());
    let mut response = next.run(req).await;

    // A slow handler must not eat into the idle budget.
    session.touch(Utc::now().timestamp());

    if let Some(stale) = session.stale_id() {
        if let Err(e) = state.sessions.delete(&stale).await {
            tracing::error!("failed to drop rotated session {stale}: {e}");
        }
    }

    // Cookie-less probes (health checks, static assets, crawlers) never
    // accumulate in the store.
    if session.is_disposable() {
        return response;
    }

    let (id, data) = session.snapshot();
    if let Err(e) = state.sessions.save(&id, data).await {
        tracing::error!("failed to persist session {id}: {e}");
    }

    let cookie = Cookie::build((session::COOKIE_NAME, id))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();
    if let Ok(value) = cookie.to_string().parse() {
        response.headers_mut().append("set-cookie", value);
    }

    response
}

async fn load(state: &SharedState, jar: &CookieJar) -> Option<Session> {
    let id = jar.get(session::COOKIE_NAME)?.value().to_string();
    match state.sessions.load(&id).await {
        Ok(Some(data)) => Some(Session::loaded(id, data)),
        Ok(None) => None,
        Err(e) => {
            tracing::error!("session store load failed: {e}");
            None
        }
    }
}
