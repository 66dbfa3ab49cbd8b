//! `engine` crate: domain models, the reconciliation state machine, its
//! retry policy, the page renderer, and the driver that runs it all.

pub mod models;
pub mod error;
pub mod config;
pub mod machine;
pub mod retry;
pub mod render;
pub mod executor;

pub use config::{Collaborators, SiteConfig};
pub use error::EngineError;
pub use executor::Reconciler;
pub use machine::{State, StateTable};
pub use models::{CurrentWeather, RunReport, SiteStatus, TriggerPayload, WorkflowInput, INITIAL_STATUS};
pub use retry::RetryPolicy;

#[cfg(test)]
mod executor_tests;
