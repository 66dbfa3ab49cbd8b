//! OpenWeather "One Call" client.
//!
//! One GET per call, no internal retry: the reconciler owns the retry policy.
//! Network errors and non-2xx responses are `Retryable`; a body that does not
//! carry `current.weather[0].main` is `Fatal`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{AdapterError, WeatherSource};

/// Data blocks the workflow never reads; excluded to keep responses small.
pub const EXCLUDED_BLOCKS: &str = "minutely,hourly,daily,alerts";

/// Connection settings for the weather API.
#[derive(Debug, Clone)]
pub struct OpenWeatherConfig {
    /// Full endpoint URL, e.g. `https://api.openweathermap.org/data/3.0/onecall`.
    pub endpoint: String,
    /// Sent as the `appid` query parameter when present.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl OpenWeatherConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    current: Option<CurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    #[serde(default)]
    weather: Vec<ConditionEntry>,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    main: Option<String>,
}

/// Pull `current.weather[0].main` out of a One Call body, lower-cased.
pub fn extract_condition(body: &str) -> Result<String, AdapterError> {
    let parsed: OneCallResponse = serde_json::from_str(body)
        .map_err(|e| AdapterError::fatal(format!("malformed weather payload: {e}")))?;

    parsed
        .current
        .and_then(|current| current.weather.into_iter().next())
        .and_then(|entry| entry.main)
        .map(|main| main.to_lowercase())
        .ok_or_else(|| AdapterError::fatal("No weather data found"))
}

pub struct OpenWeatherClient {
    client: reqwest::Client,
    config: OpenWeatherConfig,
}

impl OpenWeatherClient {
    pub fn new(config: OpenWeatherConfig) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::fatal(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    #[instrument(skip(self), fields(endpoint = %self.config.endpoint))]
    async fn current_condition(
        &self,
        latitude: &str,
        longitude: &str,
    ) -> Result<String, AdapterError> {
        let mut query = vec![
            ("lat", latitude),
            ("lon", longitude),
            ("exclude", EXCLUDED_BLOCKS),
            ("units", "imperial"),
        ];
        if let Some(key) = self.config.api_key.as_deref() {
            query.push(("appid", key));
        }

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::retryable(format!(
                "weather API responded with status {status}"
            )));
        }

        let body = response.text().await?;
        let condition = extract_condition(&body)?;
        debug!("current weather is {condition}");
        Ok(condition)
    }
}
