//! `StatusStore` backed by the `parameters` table.

use async_trait::async_trait;
use tracing::debug;

use adapters::{AdapterError, StatusStore};

use crate::repository::parameters;
use crate::{DbError, DbPool};

#[derive(Debug, Clone)]
pub struct PgStatusStore {
    pool: DbPool,
}

impl PgStatusStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn get(&self, key: &str) -> Result<String, AdapterError> {
        match parameters::get_parameter(&self.pool, key).await {
            Ok(row) => Ok(row.value),
            Err(DbError::NotFound) => Err(AdapterError::fatal(format!("parameter '{key}' not found"))),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        let row = parameters::put_parameter(&self.pool, key, value).await?;
        debug!("parameter '{}' set at {}", row.name, row.updated_at);
        Ok(())
    }

    async fn ensure(&self, key: &str, initial: &str) -> Result<String, AdapterError> {
        let row = parameters::insert_parameter_if_absent(&self.pool, key, initial).await?;
        Ok(row.value)
    }
}
