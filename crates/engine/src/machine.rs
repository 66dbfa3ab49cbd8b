//! The reconciliation state machine as data.
//!
//! [`StateTable`] maps every [`State`] to its [`StateSpec`]: what kind of
//! state it is, where it goes on success, where a caught failure goes, and
//! which retry policy wraps it. The driver in [`crate::executor`] only reads
//! this table; it never hard-codes a transition except the CompareStatus
//! decision, whose two targets are also listed here.
//!
//! ```text
//! ReadStatus ─► FetchWeather ─► CompareStatus ─┬─► UpToDate        (succeed)
//!                                              └─► UpdateSite ─► FinishUpdate (end)
//!                                                      │              │
//!                                                      └──► Failure ◄─┘  (fail)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Every state a run can visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    ReadStatus,
    FetchWeather,
    CompareStatus,
    UpToDate,
    UpdateSite,
    FinishUpdate,
    Failure,
}

impl State {
    pub const INITIAL: State = State::ReadStatus;

    pub fn is_terminal(self) -> bool {
        matches!(self, State::UpToDate | State::Failure)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadStatus => "ReadStatus",
            Self::FetchWeather => "FetchWeather",
            Self::CompareStatus => "CompareStatus",
            Self::UpToDate => "UpToDate",
            Self::UpdateSite => "UpdateSite",
            Self::FinishUpdate => "FinishUpdate",
            Self::Failure => "Failure",
        };
        f.write_str(name)
    }
}

/// Shape of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// Calls one collaborator.
    Task,
    /// Branches on run data without side effects.
    Choice { when_equal: State, otherwise: State },
    /// Runs several branches concurrently and joins on all of them.
    Parallel,
    /// Terminal success.
    Succeed,
    /// Terminal failure.
    Fail,
}

#[derive(Debug, Clone)]
pub struct StateSpec {
    pub kind: StateKind,
    /// Success transition; `None` ends the run successfully.
    pub next: Option<State>,
    /// Where a failure is routed; `None` lets it fail the run directly.
    pub catch: Option<State>,
    pub retry: Option<RetryPolicy>,
}

impl StateSpec {
    fn task(next: State) -> Self {
        Self {
            kind: StateKind::Task,
            next: Some(next),
            catch: None,
            retry: None,
        }
    }

    fn terminal(kind: StateKind) -> Self {
        Self {
            kind,
            next: None,
            catch: None,
            retry: None,
        }
    }

    fn retried(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    fn caught_by(mut self, handler: State) -> Self {
        self.catch = Some(handler);
        self
    }
}

/// Transition table for one reconciler.
#[derive(Debug, Clone)]
pub struct StateTable {
    read_status: StateSpec,
    fetch_weather: StateSpec,
    compare_status: StateSpec,
    up_to_date: StateSpec,
    update_site: StateSpec,
    finish_update: StateSpec,
    failure: StateSpec,
}

impl StateTable {
    pub fn new(fetch_retry: RetryPolicy, update_retry: RetryPolicy) -> Self {
        Self {
            read_status: StateSpec::task(State::FetchWeather),
            fetch_weather: StateSpec::task(State::CompareStatus).retried(fetch_retry),
            compare_status: StateSpec::terminal(StateKind::Choice {
                when_equal: State::UpToDate,
                otherwise: State::UpdateSite,
            }),
            up_to_date: StateSpec::terminal(StateKind::Succeed),
            update_site: StateSpec::task(State::FinishUpdate)
                .retried(update_retry)
                .caught_by(State::Failure),
            finish_update: StateSpec {
                kind: StateKind::Parallel,
                next: None,
                catch: Some(State::Failure),
                retry: None,
            },
            failure: StateSpec::terminal(StateKind::Fail),
        }
    }

    pub fn spec(&self, state: State) -> &StateSpec {
        match state {
            State::ReadStatus => &self.read_status,
            State::FetchWeather => &self.fetch_weather,
            State::CompareStatus => &self.compare_status,
            State::UpToDate => &self.up_to_date,
            State::UpdateSite => &self.update_site,
            State::FinishUpdate => &self.finish_update,
            State::Failure => &self.failure,
        }
    }
}

impl Default for StateTable {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), RetryPolicy::default())
    }
}
