//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models: they carry no domain behaviour.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored parameter row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParameterRow {
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
