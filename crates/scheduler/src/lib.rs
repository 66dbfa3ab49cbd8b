//! `scheduler` crate: turns `rate(..)`/`cron(..)` expressions into
//! reconciliation runs, with bounded redelivery and a failure alarm.

pub mod error;
pub mod expression;
pub mod target;
pub mod alarm;
pub mod runner;

pub use alarm::{AlarmConfig, AlarmState, FailureAlarm};
pub use error::{InvocationError, SchedulerError};
pub use expression::ScheduleExpression;
pub use runner::{DispatchOutcome, InvocationPolicy, Scheduler, DEFAULT_SHUTDOWN_GRACE};
pub use target::{HttpTarget, LocalTarget, RunResult, RunTarget};
