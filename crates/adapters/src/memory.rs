//! In-process status store for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{AdapterError, StatusStore};

#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one parameter.
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = HashMap::new();
        values.insert(key.into(), value.into());
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get(&self, key: &str) -> Result<String, AdapterError> {
        self.values
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AdapterError::fatal(format!("parameter '{key}' not found")))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        self.values
            .write()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn ensure(&self, key: &str, initial: &str) -> Result<String, AdapterError> {
        let mut values = self.values.write().await;
        Ok(values
            .entry(key.to_owned())
            .or_insert_with(|| initial.to_owned())
            .clone())
    }
}
