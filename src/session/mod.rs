pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::tokens;
use crate::error::AppError;

pub const COOKIE_NAME: &str = "medboard_session";

const ID_BYTES: usize = 32;
const CSRF_BYTES: usize = 32;

pub fn generate_id() -> String {
    tokens::generate(ID_BYTES)
}

/// Snapshot of the authenticated user kept in the session, refreshed at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashLevel {
    Success,
    Error,
    Notice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn css_class(&self) -> &'static str {
        match self.level {
            FlashLevel::Success => "flash-success",
            FlashLevel::Error => "flash-error",
            FlashLevel::Notice => "flash-notice",
        }
    }
}

/// One rate-limit window: attempts seen and when the window opened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateWindow {
    pub count: u32,
    pub window_start: i64,
}

/// Everything persisted for one session. Serializable so stores other than
/// the in-memory one can serialize it however they like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user: Option<SessionUser>,
    pub csrf_token: Option<String>,
    pub flash: Vec<Flash>,
    pub old_input: HashMap<String, String>,
    pub rate_limits: HashMap<String, RateWindow>,
    pub created_at: i64,
    pub last_activity: i64,
}

impl SessionData {
    pub fn new(now: i64) -> Self {
        Self {
            user: None,
            csrf_token: None,
            flash: Vec::new(),
            old_input: HashMap::new(),
            rate_limits: HashMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Nothing worth persisting: no user, no CSRF token, no flashes, no
    /// repopulation data, no rate-limit windows.
    pub fn is_blank(&self) -> bool {
        self.user.is_none()
            && self.csrf_token.is_none()
            && self.flash.is_empty()
            && self.old_input.is_empty()
            && self.rate_limits.is_empty()
    }
}

struct SessionState {
    id: String,
    /// Id the data was loaded under, if any. Cleared from the store when the
    /// session is saved under a different id.
    loaded_id: Option<String>,
    data: SessionData,
}

/// Handle to the per-request session. Cheap to clone; the guard middleware
/// creates it before routing and persists it after the handler runs.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn fresh(now: i64) -> Self {
        Self::from_parts(generate_id(), None, SessionData::new(now))
    }

    pub fn loaded(id: String, data: SessionData) -> Self {
        Self::from_parts(id.clone(), Some(id), data)
    }

    fn from_parts(id: String, loaded_id: Option<String>, data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                id,
                loaded_id,
                data,
            })),
        }
    }

    pub fn id(&self) -> String {
        self.inner.lock().unwrap().id.clone()
    }

    /// Store id the data was loaded under, when it differs from the current id.
    pub fn stale_id(&self) -> Option<String> {
        let state = self.inner.lock().unwrap();
        match &state.loaded_id {
            Some(old) if *old != state.id => Some(old.clone()),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.inner.lock().unwrap().data.user.clone()
    }

    pub fn set_user(&self, user: SessionUser) {
        self.inner.lock().unwrap().data.user = Some(user);
    }

    /// Regenerate the session id, keeping contents (anti-fixation).
    pub fn renew_id(&self) {
        let mut state = self.inner.lock().unwrap();
        state.id = generate_id();
        state.data.created_at = Utc::now().timestamp();
    }

    /// Wipe the session entirely: new id, empty data.
    pub fn invalidate(&self) {
        let mut state = self.inner.lock().unwrap();
        state.id = generate_id();
        state.data = SessionData::new(Utc::now().timestamp());
    }

    pub fn flash(&self, level: FlashLevel, message: impl Into<String>) {
        self.inner.lock().unwrap().data.flash.push(Flash {
            level,
            message: message.into(),
        });
    }

    pub fn take_flashes(&self) -> Vec<Flash> {
        std::mem::take(&mut self.inner.lock().unwrap().data.flash)
    }

    /// The per-session CSRF token, created once and kept for the session's
    /// lifetime.
    pub fn csrf_token(&self) -> String {
        let mut state = self.inner.lock().unwrap();
        state
            .data
            .csrf_token
            .get_or_insert_with(|| tokens::generate(CSRF_BYTES))
            .clone()
    }

    /// Constant-time check of a posted CSRF token against the session's.
    /// A session without a token rejects everything.
    pub fn verify_csrf(&self, presented: &str) -> bool {
        let expected = self.inner.lock().unwrap().data.csrf_token.clone();
        match expected {
            Some(expected) => tokens::ct_eq(&expected, presented),
            None => false,
        }
    }

    pub fn set_old_input(&self, fields: Vec<(&str, String)>) {
        let mut state = self.inner.lock().unwrap();
        state.data.old_input.clear();
        for (key, value) in fields {
            state.data.old_input.insert(key.to_string(), value);
        }
    }

    pub fn take_old_input(&self) -> HashMap<String, String> {
        std::mem::take(&mut self.inner.lock().unwrap().data.old_input)
    }

    pub fn touch(&self, now: i64) {
        self.inner.lock().unwrap().data.last_activity = now;
    }

    pub fn created_at(&self) -> i64 {
        self.inner.lock().unwrap().data.created_at
    }

    pub fn last_activity(&self) -> i64 {
        self.inner.lock().unwrap().data.last_activity
    }

    /// Run a closure over the rate-limit windows under the session lock.
    pub fn with_rate_limits<T>(&self, f: impl FnOnce(&mut HashMap<String, RateWindow>) -> T) -> T {
        f(&mut self.inner.lock().unwrap().data.rate_limits)
    }

    pub fn snapshot(&self) -> (String, SessionData) {
        let state = self.inner.lock().unwrap();
        (state.id.clone(), state.data.clone())
    }

    /// A session that was never in the store and holds nothing needs neither
    /// persisting nor a cookie. Keeps anonymous probes out of the store.
    pub fn is_disposable(&self) -> bool {
        let state = self.inner.lock().unwrap();
        state.loaded_id.is_none() && state.data.is_blank()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session middleware not installed".to_string()))
    }
}

/// Extractor for handlers that require an authenticated session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        session
            .user()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))
    }
}
