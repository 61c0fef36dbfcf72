use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Specialization;

pub async fn list_all(pool: &PgPool) -> Result<Vec<Specialization>, sqlx::Error> {
    sqlx::query_as::<_, Specialization>("SELECT * FROM specializations ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Specialization>, sqlx::Error> {
    sqlx::query_as::<_, Specialization>("SELECT * FROM specializations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM specializations WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}
