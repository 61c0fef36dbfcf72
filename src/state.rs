use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::email::SystemMailer;
use crate::rate_limit::RateLimiter;
use crate::session::store::SessionStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub sessions: Arc<dyn SessionStore>,
    pub mailer: Option<Arc<SystemMailer>>,
    pub limiter: RateLimiter,
}
