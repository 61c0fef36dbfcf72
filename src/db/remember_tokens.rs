use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::RememberToken;

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    selector: &str,
    validator_hash: &str,
    user_agent_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<RememberToken, sqlx::Error> {
    sqlx::query_as::<_, RememberToken>(
        "INSERT INTO remember_tokens (user_id, selector, validator_hash, user_agent_hash, expires_at)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(user_id)
    .bind(selector)
    .bind(validator_hash)
    .bind(user_agent_hash)
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

pub async fn find_valid_by_selector(
    pool: &PgPool,
    selector: &str,
) -> Result<Option<RememberToken>, sqlx::Error> {
    sqlx::query_as::<_, RememberToken>(
        "SELECT * FROM remember_tokens WHERE selector = $1 AND expires_at > now()",
    )
    .bind(selector)
    .fetch_optional(pool)
    .await
}

pub async fn delete_by_selector(pool: &PgPool, selector: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM remember_tokens WHERE selector = $1")
        .bind(selector)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM remember_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
