//! Process-wide settings, read once from flags or the environment and turned
//! into the immutable values the engine runs with.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Args;
use tracing::{info, warn};

use adapters::http::{EmailConfig, EmailNotifier, HttpInvalidator};
use adapters::local::{DirectoryPublisher, LoggingInvalidator};
use adapters::memory::InMemoryStatusStore;
use adapters::weather::{OpenWeatherClient, OpenWeatherConfig};
use adapters::{CacheInvalidator, Notifier, StatusStore};
use engine::config::DEFAULT_STATUS_PARAMETER;
use engine::{Collaborators, SiteConfig, TriggerPayload, WorkflowInput, INITIAL_STATUS};

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Weather kind the site tracks, e.g. "snow" or "rain".
    #[arg(long, env = "WEATHER_TYPE", default_value = "snow", global = true)]
    pub weather_type: String,

    #[arg(long, env = "WEATHER_LOCATION_LAT", global = true)]
    pub latitude: Option<String>,

    #[arg(long, env = "WEATHER_LOCATION_LON", global = true)]
    pub longitude: Option<String>,

    #[arg(long, env = "STACK_NAME", default_value = "myStack", global = true)]
    pub stack_name: String,

    /// Place name shown in the page heading.
    #[arg(long, env = "LOCATION_NAME", global = true)]
    pub location_name: Option<String>,

    #[arg(long, env = "OPEN_WEATHER_URL", global = true)]
    pub open_weather_url: Option<String>,

    #[arg(long, env = "OPEN_WEATHER_API_KEY", hide_env_values = true, global = true)]
    pub open_weather_api_key: Option<String>,

    /// Footer link for the weather data source.
    #[arg(
        long,
        env = "SOURCE_URL",
        default_value = "https://openweathermap.org/",
        global = true
    )]
    pub source_url: String,

    #[arg(long, env = "STATUS_PARAMETER", default_value = DEFAULT_STATUS_PARAMETER, global = true)]
    pub status_parameter: String,

    /// Postgres URL for the status store. Without it status lives in memory.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    pub database_url: Option<String>,

    /// Directory the page is published into.
    #[arg(long, env = "SITE_DIR", default_value = "site", global = true)]
    pub site_dir: PathBuf,

    #[arg(long, env = "CDN_PURGE_URL", global = true)]
    pub cdn_purge_url: Option<String>,

    #[arg(long, env = "CDN_PURGE_TOKEN", hide_env_values = true, global = true)]
    pub cdn_purge_token: Option<String>,

    /// Recipient of change notifications and failure alarms.
    #[arg(long, env = "ALERT_EMAIL", global = true)]
    pub alert_email: Option<String>,

    #[arg(long, env = "MAIL_API_URL", global = true)]
    pub mail_api_url: Option<String>,

    #[arg(long, env = "MAIL_API_KEY", hide_env_values = true, global = true)]
    pub mail_api_key: Option<String>,

    #[arg(long, env = "MAIL_SENDER", global = true)]
    pub mail_sender: Option<String>,
}

fn require(missing: Vec<&str>) -> anyhow::Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        bail!("missing required settings: {}", missing.join(", "))
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// The value, unless it is unset or blank.
fn present(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn site_config(&self) -> anyhow::Result<SiteConfig> {
        require(if blank(&self.location_name) { vec!["LOCATION_NAME"] } else { vec![] })?;
        let location = self.location_name.clone().unwrap_or_default();
        Ok(SiteConfig::new(location, &self.source_url).with_status_parameter(&self.status_parameter))
    }

    pub fn payload(&self) -> anyhow::Result<TriggerPayload> {
        let mut missing = Vec::new();
        if blank(&self.latitude) {
            missing.push("WEATHER_LOCATION_LAT");
        }
        if blank(&self.longitude) {
            missing.push("WEATHER_LOCATION_LON");
        }
        require(missing)?;

        Ok(TriggerPayload {
            weather_type: self.weather_type.clone(),
            latitude: self.latitude.clone().unwrap_or_default(),
            longitude: self.longitude.clone().unwrap_or_default(),
            stack_name: self.stack_name.clone(),
        })
    }

    pub fn workflow_input(&self) -> anyhow::Result<WorkflowInput> {
        Ok(WorkflowInput::try_from(self.payload()?)?)
    }

    /// Email settings, present only when every mail value is configured.
    pub fn email(&self) -> Option<EmailConfig> {
        let recipient = present(&self.alert_email)?;
        match (
            present(&self.mail_api_url),
            present(&self.mail_api_key),
            present(&self.mail_sender),
        ) {
            (Some(api_url), Some(api_key), Some(sender)) => Some(EmailConfig {
                api_url,
                api_key,
                sender_email: sender,
                sender_name: self.stack_name.clone(),
                recipient,
            }),
            _ => {
                warn!("ALERT_EMAIL is set but MAIL_API_URL, MAIL_API_KEY or MAIL_SENDER is not; email disabled");
                None
            }
        }
    }

    pub fn notifier(&self) -> anyhow::Result<Option<Arc<dyn Notifier>>> {
        let Some(email) = self.email() else {
            return Ok(None);
        };
        let notifier = EmailNotifier::new(email).context("building email notifier")?;
        Ok(Some(Arc::new(notifier)))
    }

    pub async fn status_store(&self) -> anyhow::Result<Arc<dyn StatusStore>> {
        match &self.database_url {
            Some(url) => {
                let pool = db::pool::create_pool(url, 5)
                    .await
                    .context("connecting to the status database")?;
                Ok(Arc::new(db::PgStatusStore::new(pool)))
            }
            None => {
                warn!("DATABASE_URL not set; status is kept in memory for this process only");
                Ok(Arc::new(InMemoryStatusStore::with_value(
                    &self.status_parameter,
                    INITIAL_STATUS,
                )))
            }
        }
    }

    pub async fn collaborators(&self) -> anyhow::Result<Collaborators> {
        require(if blank(&self.open_weather_url) { vec!["OPEN_WEATHER_URL"] } else { vec![] })?;

        let mut weather = OpenWeatherConfig::new(self.open_weather_url.clone().unwrap_or_default());
        if let Some(key) = &self.open_weather_api_key {
            weather = weather.with_api_key(key);
        }

        let invalidator: Arc<dyn CacheInvalidator> = match &self.cdn_purge_url {
            Some(url) => Arc::new(
                HttpInvalidator::new(url, self.cdn_purge_token.clone())
                    .context("building CDN invalidator")?,
            ),
            None => Arc::new(LoggingInvalidator),
        };

        info!("publishing pages into {}", self.site_dir.display());
        Ok(Collaborators {
            status_store: self.status_store().await?,
            weather: Arc::new(OpenWeatherClient::new(weather).context("building weather client")?),
            publisher: Arc::new(DirectoryPublisher::new(&self.site_dir)),
            invalidator,
            notifier: self.notifier()?,
        })
    }
}
