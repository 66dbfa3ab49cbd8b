//! Local stand-ins for the hosting platform: a directory acting as the
//! object bucket and an invalidator that only logs.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::{AdapterError, CacheInvalidator, ObjectPublisher};

/// Writes objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    root: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, AdapterError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(AdapterError::fatal(format!("invalid object key '{key}'")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectPublisher for DirectoryPublisher {
    async fn put_object(
        &self,
        key: &str,
        body: String,
        content_type: &str,
    ) -> Result<(), AdapterError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AdapterError::retryable(format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| AdapterError::retryable(format!("write {}: {e}", path.display())))?;
        info!("published {} ({content_type}) to {}", key, path.display());
        Ok(())
    }
}

/// Invalidator for deployments without a CDN in front of the bucket.
#[derive(Debug, Clone, Default)]
pub struct LoggingInvalidator;

#[async_trait]
impl CacheInvalidator for LoggingInvalidator {
    async fn invalidate(&self, paths: &[String], caller_reference: &str) -> Result<(), AdapterError> {
        info!(caller_reference, "no CDN configured; skipping invalidation of {paths:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("weather-site-{name}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn writes_object_under_root() {
        let root = scratch_dir("publish");
        let publisher = DirectoryPublisher::new(&root);

        publisher
            .put_object("index.html", "<p>hi</p>".into(), "text/html")
            .await
            .unwrap();

        let written = tokio::fs::read_to_string(root.join("index.html")).await.unwrap();
        assert_eq!(written, "<p>hi</p>");
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_root() {
        let publisher = DirectoryPublisher::new(scratch_dir("escape"));
        let err = publisher
            .put_object("../index.html", String::new(), "text/html")
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
