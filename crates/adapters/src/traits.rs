//! Capability traits: the narrow contracts the reconciler consumes.
//!
//! Each managed service the workflow touches is one trait with one or two
//! methods. Concrete implementations live in sibling modules; test doubles
//! live in [`crate::mock`].

use async_trait::async_trait;

use crate::AdapterError;

/// Durable key/value parameter holding the last observed status label.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Read the current value of `key`.
    async fn get(&self, key: &str) -> Result<String, AdapterError>;

    /// Write `value` to `key`, overwriting any previous value.
    async fn put(&self, key: &str, value: &str) -> Result<(), AdapterError>;

    /// Create `key` with `initial` if it does not exist yet. Existing values
    /// are left untouched. Returns the value now stored.
    async fn ensure(&self, key: &str, initial: &str) -> Result<String, AdapterError>;
}

/// External weather API.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Return the primary current condition (e.g. `"snow"`, `"clear"`) for
    /// the coordinate, already lower-cased.
    async fn current_condition(&self, latitude: &str, longitude: &str)
        -> Result<String, AdapterError>;
}

/// Durable write target for the rendered page.
#[async_trait]
pub trait ObjectPublisher: Send + Sync {
    async fn put_object(&self, key: &str, body: String, content_type: &str)
        -> Result<(), AdapterError>;
}

/// CDN cache invalidation trigger.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// `caller_reference` must be unique per call.
    async fn invalidate(&self, paths: &[String], caller_reference: &str)
        -> Result<(), AdapterError>;
}

/// Human-readable message publisher (email, chat, …).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), AdapterError>;
}
