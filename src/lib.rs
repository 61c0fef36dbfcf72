pub mod auth;
pub mod client_ip;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod session;
pub mod state;
pub mod views;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::PgPool;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Config;
use crate::email::SystemMailer;
use crate::middleware::auth_redirect::redirect_unauthorized;
use crate::middleware::remember_login::remember_login;
use crate::middleware::session_guard::session_guard;
use crate::rate_limit::RateLimiter;
use crate::session::store::MemoryStore;
use crate::state::{AppState, SharedState};

pub fn build_app(pool: PgPool, config: Config) -> Router {
    let mailer = config.smtp.as_ref().and_then(|smtp| {
        match SystemMailer::new(smtp) {
            Ok(mailer) => {
                tracing::info!("System SMTP configured");
                Some(Arc::new(mailer))
            }
            Err(e) => {
                tracing::warn!("System SMTP not available: {e}");
                None
            }
        }
    });

    let limiter = RateLimiter::new(config.rate_window_secs, config.rate_max_attempts);

    let sessions = Arc::new(MemoryStore::new());
    spawn_session_sweeper(sessions.clone(), config.session_idle_secs);

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        sessions,
        mailer,
        limiter,
    });

    Router::new()
        .merge(routes::form_routes())
        .merge(views::view_routes().layer(axum::middleware::from_fn(redirect_unauthorized)))
        .nest_service("/static", ServeDir::new("static"))
        .route("/health", axum::routing::get(health))
        // remember_login must see the session the guard installs, so the
        // guard is layered last (outermost).
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            remember_login,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_guard,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Periodically evicts sessions whose last save is older than twice the idle
/// timeout. The grace keeps the inactivity notice around for returning
/// clients; anything older is unreachable garbage.
fn spawn_session_sweeper(sessions: Arc<MemoryStore>, idle_secs: i64) {
    let max_age = Duration::from_secs((idle_secs.max(1) as u64).saturating_mul(2));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            sessions.cleanup(max_age);
        }
    });
}
