//! Core domain models for the reconciliation workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{machine::State, EngineError};

/// Value written to the status parameter when it is first provisioned.
pub const INITIAL_STATUS: &str = "Initial value";

// ---------------------------------------------------------------------------
// Trigger payload
// ---------------------------------------------------------------------------

/// JSON object the scheduler sends on every tick. Field names and order are
/// part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    #[serde(rename = "WEATHER_TYPE")]
    pub weather_type: String,
    #[serde(rename = "WEATHER_LOCATION_LAT")]
    pub latitude: String,
    #[serde(rename = "WEATHER_LOCATION_LON")]
    pub longitude: String,
    #[serde(rename = "STACK_NAME")]
    pub stack_name: String,
}

// ---------------------------------------------------------------------------
// WorkflowInput
// ---------------------------------------------------------------------------

/// Immutable per-run parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    /// Lower-cased condition being tracked, e.g. `"snow"`.
    pub weather_kind: String,
    pub latitude: String,
    pub longitude: String,
    /// Deployment that triggered the run; used in notification text.
    pub stack_label: String,
}

impl WorkflowInput {
    pub fn new(
        weather_kind: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
        stack_label: impl Into<String>,
    ) -> Self {
        Self {
            weather_kind: weather_kind.into().trim().to_lowercase(),
            latitude: latitude.into(),
            longitude: longitude.into(),
            stack_label: stack_label.into(),
        }
    }
}

impl TryFrom<TriggerPayload> for WorkflowInput {
    type Error = EngineError;

    fn try_from(payload: TriggerPayload) -> Result<Self, Self::Error> {
        let missing: Vec<&str> = [
            ("WEATHER_TYPE", &payload.weather_type),
            ("WEATHER_LOCATION_LAT", &payload.latitude),
            ("WEATHER_LOCATION_LON", &payload.longitude),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        Ok(Self::new(
            payload.weather_type,
            payload.latitude,
            payload.longitude,
            payload.stack_name,
        ))
    }
}

impl From<&WorkflowInput> for TriggerPayload {
    fn from(input: &WorkflowInput) -> Self {
        Self {
            weather_type: input.weather_kind.clone(),
            latitude: input.latitude.clone(),
            longitude: input.longitude.clone(),
            stack_name: input.stack_label.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// SiteStatus / CurrentWeather
// ---------------------------------------------------------------------------

/// Last observed label, as held by the status store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStatus {
    pub value: String,
}

/// Label derived from this run's weather observation. Always either the
/// tracked kind or `"no "` followed by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub label: String,
}

impl CurrentWeather {
    /// Normalise a raw API condition against the tracked kind.
    ///
    /// Matching is case-insensitive and succeeds when the condition contains
    /// the kind (so `"thunderstorm"` counts as `"storm"`).
    pub fn classify(raw_condition: &str, weather_kind: &str) -> Self {
        let kind = weather_kind.trim().to_lowercase();
        let condition = raw_condition.trim().to_lowercase();

        let label = if condition.contains(&kind) {
            kind
        } else {
            format!("no {kind}")
        };
        Self { label }
    }

    /// Whether the page should answer "NO.".
    pub fn is_negative(&self) -> bool {
        self.label.starts_with("no")
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// Summary of a run that reached a successful end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stack_label: String,
    pub started_at: DateTime<Utc>,
    /// States in visit order, initial state first.
    pub states: Vec<State>,
    pub previous_status: String,
    pub current_status: String,
    /// `true` when the page, status and cache were updated.
    pub changed: bool,
}
