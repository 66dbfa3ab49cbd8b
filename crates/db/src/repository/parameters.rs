//! Parameter read/write operations.

use chrono::Utc;
use sqlx::PgPool;

use crate::{models::ParameterRow, DbError};

/// Fetch a parameter by name.
pub async fn get_parameter(pool: &PgPool, name: &str) -> Result<ParameterRow, DbError> {
    let row = sqlx::query_as::<_, ParameterRow>(
        r#"SELECT name, value, updated_at FROM parameters WHERE name = $1"#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Write a parameter, overwriting any existing value.
pub async fn put_parameter(pool: &PgPool, name: &str, value: &str) -> Result<ParameterRow, DbError> {
    let row = sqlx::query_as::<_, ParameterRow>(
        r#"
        INSERT INTO parameters (name, value, updated_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
        RETURNING name, value, updated_at
        "#,
    )
    .bind(name)
    .bind(value)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Create a parameter with `initial` unless it already exists, then return
/// whatever is stored.
pub async fn insert_parameter_if_absent(
    pool: &PgPool,
    name: &str,
    initial: &str,
) -> Result<ParameterRow, DbError> {
    sqlx::query(
        r#"
        INSERT INTO parameters (name, value, updated_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(initial)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    get_parameter(pool, name).await
}
