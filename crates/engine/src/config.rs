//! Static site configuration and the collaborator set a reconciler runs with.
//!
//! Both are assembled once at start-up and never mutated afterwards.

use std::sync::Arc;

use adapters::{CacheInvalidator, Notifier, ObjectPublisher, StatusStore, WeatherSource};

use crate::render::PAGE_KEY;
use crate::retry::RetryPolicy;

pub const DEFAULT_STATUS_PARAMETER: &str = "weather-site-status";

#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Human-readable place shown in the page heading.
    pub location_name: String,
    /// Link target in the page footer.
    pub source_url: String,
    /// Status store key holding the last label.
    pub status_parameter: String,
    /// Object key the page is written to.
    pub page_key: String,
    /// CDN paths invalidated after a publish.
    pub invalidation_paths: Vec<String>,
    pub fetch_retry: RetryPolicy,
    pub update_retry: RetryPolicy,
}

impl SiteConfig {
    pub fn new(location_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            location_name: location_name.into(),
            source_url: source_url.into(),
            status_parameter: DEFAULT_STATUS_PARAMETER.to_string(),
            page_key: PAGE_KEY.to_string(),
            invalidation_paths: vec![format!("/{PAGE_KEY}")],
            fetch_retry: RetryPolicy::default(),
            update_retry: RetryPolicy::default(),
        }
    }

    pub fn with_status_parameter(mut self, name: impl Into<String>) -> Self {
        self.status_parameter = name.into();
        self
    }
}

/// Handles to every managed service the workflow touches.
#[derive(Clone)]
pub struct Collaborators {
    pub status_store: Arc<dyn StatusStore>,
    pub weather: Arc<dyn WeatherSource>,
    pub publisher: Arc<dyn ObjectPublisher>,
    pub invalidator: Arc<dyn CacheInvalidator>,
    /// Change notifications are only sent when a target is configured.
    pub notifier: Option<Arc<dyn Notifier>>,
}
