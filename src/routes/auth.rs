use std::net::{IpAddr, SocketAddr};
use std::sync::LazyLock;

use axum::extract::{ConnectInfo, Form, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::credentials::{self, INVALID_CREDENTIALS};
use crate::auth::{remember, tokens};
use crate::client_ip;
use crate::db;
use crate::error::AppError;
use crate::session::{FlashLevel, Session, SessionUser};
use crate::state::SharedState;

/// Anti-enumeration: shown whether or not the email matches an account.
pub const RESET_SENT: &str = "If that email is registered, a reset link has been sent.";
/// One message for every way a reset token can be bad.
pub const RESET_INVALID: &str = "This reset link is invalid or has expired.";
pub const CSRF_MISMATCH: &str = "Your form session expired. Please try again.";

const RESET_TTL_MINUTES: i64 = 30;
const RESET_TOKEN_BYTES: usize = 32;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{3,30}$").unwrap());

#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(default)]
    pub specialization_id: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub remember: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    pub token: String,
    pub user: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(default)]
    pub csrf_token: String,
}

fn resolve_ip(state: &SharedState, headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    client_ip::resolve(headers, Some(peer.ip()), &state.config.trusted_proxies)
}

fn rate_limited_flash(session: &Session, wait_secs: i64) {
    session.flash(
        FlashLevel::Error,
        format!("Too many attempts. Please try again in {wait_secs} seconds."),
    );
}

pub async fn register(
    State(state): State<SharedState>,
    session: Session,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, AppError> {
    let ip = resolve_ip(&state, &headers, peer);
    let now = Utc::now().timestamp();

    if let Err(wait) = state.limiter.check(&session, "register", ip, now) {
        rate_limited_flash(&session, wait);
        return Ok(Redirect::to("/register"));
    }

    let keep_input = || {
        session.set_old_input(vec![
            ("email", form.email.clone()),
            ("username", form.username.clone()),
            ("firstname", form.firstname.clone()),
            ("lastname", form.lastname.clone()),
            ("specialization_id", form.specialization_id.clone()),
        ]);
    };

    if !session.verify_csrf(&form.csrf_token) {
        session.flash(FlashLevel::Error, CSRF_MISMATCH);
        keep_input();
        return Ok(Redirect::to("/register"));
    }

    state.limiter.hit(&session, "register", ip, now);

    let email = form.email.trim().to_lowercase();
    let username = form.username.trim().to_lowercase();
    let firstname = form.firstname.trim().to_string();
    let lastname = form.lastname.trim().to_string();

    let mut errors = Vec::new();
    if !EMAIL_RE.is_match(&email) {
        errors.push("Please enter a valid email address.");
    }
    if !USERNAME_RE.is_match(&username) {
        errors.push("Username must be 3-30 characters: lowercase letters, digits, underscore.");
    }
    if firstname.is_empty() || firstname.len() > 60 {
        errors.push("First name is required (max 60 characters).");
    }
    if lastname.is_empty() || lastname.len() > 60 {
        errors.push("Last name is required (max 60 characters).");
    }
    if form.password.len() < 8 {
        errors.push("Password must be at least 8 characters.");
    }
    if form.password != form.password_confirmation {
        errors.push("Passwords do not match.");
    }

    let specialization_id = match form.specialization_id.trim() {
        "" => None,
        raw => {
            let id = raw.parse::<Uuid>().ok();
            let known = match id {
                Some(id) => db::specializations::exists(&state.pool, id).await?,
                None => false,
            };
            if !known {
                errors.push("Please pick a valid specialization.");
            }
            id.filter(|_| known)
        }
    };

    if !errors.is_empty() {
        for error in errors {
            session.flash(FlashLevel::Error, error);
        }
        keep_input();
        return Ok(Redirect::to("/register"));
    }

    let password_hash =
        crate::auth::password::hash(&form.password).map_err(AppError::Internal)?;

    let user = match db::users::create(
        &state.pool,
        &email,
        &username,
        &password_hash,
        &firstname,
        &lastname,
        specialization_id,
    )
    .await
    {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            session.flash(FlashLevel::Error, "That email or username is already taken.");
            keep_input();
            return Ok(Redirect::to("/register"));
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(mailer) = state.mailer.clone() {
        let base_url = state.config.base_url.clone();
        let to = user.email.clone();
        let firstname = user.firstname.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_welcome(&to, &firstname, &base_url).await {
                tracing::error!("Failed to send welcome email: {e}");
            }
        });
    }

    tracing::info!(user_id = %user.id, "new registration");
    session.flash(FlashLevel::Success, "Account created. You can log in now.");
    Ok(Redirect::to("/login"))
}

pub async fn login(
    State(state): State<SharedState>,
    session: Session,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    let ip = resolve_ip(&state, &headers, peer);
    let now = Utc::now().timestamp();

    if let Err(wait) = state.limiter.check(&session, "login", ip, now) {
        rate_limited_flash(&session, wait);
        return Ok((jar, Redirect::to("/login")));
    }

    if !session.verify_csrf(&form.csrf_token) {
        session.flash(FlashLevel::Error, CSRF_MISMATCH);
        session.set_old_input(vec![("login", form.login.clone())]);
        return Ok((jar, Redirect::to("/login")));
    }

    state.limiter.hit(&session, "login", ip, now);

    let Some(user) = credentials::verify_login(&state.pool, &form.login, &form.password).await?
    else {
        session.flash(FlashLevel::Error, INVALID_CREDENTIALS);
        session.set_old_input(vec![("login", form.login.clone())]);
        return Ok((jar, Redirect::to("/login")));
    };

    state.limiter.reset(&session, "login", ip);
    session.renew_id();
    session.set_user(SessionUser {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        firstname: user.firstname.clone(),
        lastname: user.lastname.clone(),
    });

    let jar = if form.remember.is_some() {
        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        // The login already succeeded; a missing remember cookie is the
        // worst outcome here.
        match remember::issue(&state.pool, user.id, user_agent).await {
            Ok((pair, _)) => jar.add(remember::cookie(&pair)),
            Err(e) => {
                tracing::error!("failed to issue remember token for {}: {e}", user.id);
                jar
            }
        }
    } else {
        jar
    };

    tracing::info!(user_id = %user.id, "interactive login");
    Ok((jar, Redirect::to("/dashboard")))
}

pub async fn logout(
    State(state): State<SharedState>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<LogoutForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    if !session.verify_csrf(&form.csrf_token) {
        session.flash(FlashLevel::Error, CSRF_MISMATCH);
        return Ok((jar, Redirect::to("/dashboard")));
    }

    if let Some(cookie) = jar.get(remember::COOKIE_NAME) {
        if let Some((selector, _)) = remember::parse_cookie_value(cookie.value()) {
            db::remember_tokens::delete_by_selector(&state.pool, &selector).await?;
        }
    }

    session.invalidate();
    session.flash(FlashLevel::Success, "You have been logged out.");
    Ok((jar.add(remember::removal_cookie()), Redirect::to("/login")))
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    session: Session,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Redirect, AppError> {
    let ip = resolve_ip(&state, &headers, peer);
    let now = Utc::now().timestamp();

    if let Err(wait) = state.limiter.check(&session, "password-reset", ip, now) {
        rate_limited_flash(&session, wait);
        return Ok(Redirect::to("/forgot-password"));
    }

    if !session.verify_csrf(&form.csrf_token) {
        session.flash(FlashLevel::Error, CSRF_MISMATCH);
        session.set_old_input(vec![("email", form.email.clone())]);
        return Ok(Redirect::to("/forgot-password"));
    }

    state.limiter.hit(&session, "password-reset", ip, now);

    // The flash is identical whether or not the account exists; the lookup
    // and delivery happen off the response path.
    session.flash(FlashLevel::Success, RESET_SENT);

    let email = form.email.trim().to_lowercase();
    if EMAIL_RE.is_match(&email) {
        let pool = state.pool.clone();
        let mailer = state.mailer.clone();
        let base_url = state.config.base_url.clone();

        tokio::spawn(async move {
            let user = match db::users::find_by_email(&pool, &email).await {
                Ok(Some(user)) => user,
                Ok(None) => return,
                Err(e) => {
                    tracing::error!("reset request lookup failed: {e}");
                    return;
                }
            };

            if let Err(e) = db::password_resets::invalidate_unused_for_user(&pool, user.id).await {
                tracing::error!("failed to supersede old resets: {e}");
                return;
            }

            let token = tokens::generate(RESET_TOKEN_BYTES);
            let expires_at = Utc::now() + Duration::minutes(RESET_TTL_MINUTES);
            if let Err(e) =
                db::password_resets::create(&pool, user.id, &tokens::hash(&token), expires_at)
                    .await
            {
                tracing::error!("failed to store reset request: {e}");
                return;
            }

            let reset_url = format!("{base_url}/reset-password?token={token}&user={}", user.id);
            match mailer {
                Some(mailer) => {
                    if let Err(e) = mailer.send_password_reset(&user.email, &reset_url).await {
                        tracing::error!("Failed to send password reset email: {e}");
                    }
                }
                None => tracing::warn!("SMTP not configured. Password reset url: {reset_url}"),
            }
        });
    }

    Ok(Redirect::to("/forgot-password"))
}

pub async fn reset_password(
    State(state): State<SharedState>,
    session: Session,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Redirect, AppError> {
    let token_shaped = tokens::is_hex_of_len(&form.token, RESET_TOKEN_BYTES * 2);
    let user_id = form.user.parse::<Uuid>().ok();

    // Only well-formed values may be echoed into a Location header; anything
    // else goes back to the bare form.
    let back = match (token_shaped, user_id) {
        (true, Some(user_id)) => format!("/reset-password?token={}&user={user_id}", form.token),
        _ => "/reset-password".to_string(),
    };

    if !session.verify_csrf(&form.csrf_token) {
        session.flash(FlashLevel::Error, CSRF_MISMATCH);
        return Ok(Redirect::to(&back));
    }

    if form.password.len() < 8 {
        session.flash(FlashLevel::Error, "Password must be at least 8 characters.");
        return Ok(Redirect::to(&back));
    }
    if form.password != form.password_confirmation {
        session.flash(FlashLevel::Error, "Passwords do not match.");
        return Ok(Redirect::to(&back));
    }

    // Token shape, user id shape, unknown record, expiry, prior use: all
    // collapse into the one generic outcome.
    let reset = match user_id {
        Some(user_id) if token_shaped => {
            db::password_resets::find_active(&state.pool, user_id, &tokens::hash(&form.token))
                .await?
        }
        _ => None,
    };
    let Some(reset) = reset else {
        session.flash(FlashLevel::Error, RESET_INVALID);
        return Ok(Redirect::to(&back));
    };

    // Fixed order: hash, update, mark used.
    let password_hash =
        crate::auth::password::hash(&form.password).map_err(AppError::Internal)?;
    db::users::update_password_hash(&state.pool, reset.user_id, &password_hash).await?;
    db::password_resets::mark_used(&state.pool, reset.id).await?;

    // A changed password retires every persistent login.
    db::remember_tokens::delete_all_for_user(&state.pool, reset.user_id).await?;

    tracing::info!(user_id = %reset.user_id, "password reset completed");
    session.flash(FlashLevel::Success, "Your password has been reset. Please log in.");
    Ok(Redirect::to("/login"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_and_rejects() {
        assert!(EMAIL_RE.is_match("a.ruiz@example.org"));
        assert!(EMAIL_RE.is_match("x@y.co"));
        assert!(!EMAIL_RE.is_match("not-an-email"));
        assert!(!EMAIL_RE.is_match("a@b"));
        assert!(!EMAIL_RE.is_match("a b@c.d"));
        assert!(!EMAIL_RE.is_match(""));
    }

    #[test]
    fn username_regex_accepts_and_rejects() {
        assert!(USERNAME_RE.is_match("aruiz_42"));
        assert!(!USERNAME_RE.is_match("ab"));
        assert!(!USERNAME_RE.is_match("Mixed"));
        assert!(!USERNAME_RE.is_match("has space"));
        assert!(!USERNAME_RE.is_match(&"x".repeat(31)));
    }
}
