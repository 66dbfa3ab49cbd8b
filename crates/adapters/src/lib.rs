//! `adapters` crate: the capability traits the reconciler talks through,
//! plus concrete implementations and test doubles.
//!
//! Every managed service (parameter store, weather API, object storage,
//! CDN, notifications) is reached only through a trait in [`traits`].

pub mod error;
pub mod traits;
pub mod weather;
pub mod memory;
pub mod local;
pub mod http;
pub mod mock;

pub use error::AdapterError;
pub use traits::{CacheInvalidator, Notifier, ObjectPublisher, StatusStore, WeatherSource};
