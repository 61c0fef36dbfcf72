use sqlx::PgPool;

use crate::auth::password;
use crate::db;
use crate::error::AppError;
use crate::models::User;

/// The one message shown for every failed login. No variant may reveal
/// whether the login or the password was wrong.
pub const INVALID_CREDENTIALS: &str = "Invalid login or password.";

/// Verify a login identifier (email or username, case-insensitive) and a
/// plaintext password. Returns `None` for every kind of mismatch.
///
/// On success the stored hash is transparently upgraded if it was produced
/// with weaker parameters than the current policy.
pub async fn verify_login(
    pool: &PgPool,
    login: &str,
    plaintext: &str,
) -> Result<Option<User>, AppError> {
    if login.trim().is_empty() || plaintext.is_empty() {
        return Ok(None);
    }

    let Some(mut user) = db::users::find_by_login(pool, login.trim()).await? else {
        return Ok(None);
    };

    let valid = password::verify(plaintext, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        return Ok(None);
    }

    match password::needs_rehash(&user.password_hash) {
        Ok(true) => match password::hash(plaintext) {
            Ok(new_hash) => match db::users::update_password_hash(pool, user.id, &new_hash).await {
                Ok(()) => {
                    user.password_hash = new_hash;
                    tracing::info!(user_id = %user.id, "password hash upgraded to current policy");
                }
                // A failed upgrade never blocks a successful login.
                Err(e) => tracing::error!("storing upgraded hash failed for user {}: {e}", user.id),
            },
            Err(e) => tracing::error!("rehash failed for user {}: {e}", user.id),
        },
        Ok(false) => {}
        Err(e) => tracing::error!("unreadable stored hash for user {}: {e}", user.id),
    }

    Ok(Some(user))
}
