//! Damped failure alerting.
//!
//! Failed runs are counted over a rolling window. The alarm fires once when
//! the count reaches the threshold and stays raised (without re-notifying)
//! until the window drains below it again.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use adapters::Notifier;

#[derive(Debug, Clone)]
pub struct AlarmConfig {
    pub name: String,
    /// Failures within `period` that raise the alarm.
    pub threshold: usize,
    pub period: Duration,
}

impl AlarmConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threshold: 2,
            period: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Ok,
    Alarm,
}

#[derive(Debug)]
struct Window {
    failures: VecDeque<DateTime<Utc>>,
    state: AlarmState,
}

pub struct FailureAlarm {
    config: AlarmConfig,
    notifier: Arc<dyn Notifier>,
    window: Mutex<Window>,
}

impl FailureAlarm {
    pub fn new(config: AlarmConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            notifier,
            window: Mutex::new(Window {
                failures: VecDeque::new(),
                state: AlarmState::Ok,
            }),
        }
    }

    /// Count a failed run observed at `at` and re-evaluate.
    pub async fn record_failure(&self, at: DateTime<Utc>) -> AlarmState {
        let (state, count, raised) = {
            let mut window = self.window.lock().await;
            window.failures.push_back(at);
            self.evaluate_locked(&mut window, at)
        };

        if raised {
            self.raise(count).await;
        }
        state
    }

    /// Re-evaluate without a new data point, letting old failures expire.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> AlarmState {
        let mut window = self.window.lock().await;
        self.evaluate_locked(&mut window, now).0
    }

    fn evaluate_locked(&self, window: &mut Window, now: DateTime<Utc>) -> (AlarmState, usize, bool) {
        let expired = |oldest: &DateTime<Utc>| {
            now.signed_duration_since(*oldest)
                .to_std()
                .is_ok_and(|age| age >= self.config.period)
        };
        while window.failures.front().is_some_and(expired) {
            window.failures.pop_front();
        }

        let count = window.failures.len();
        let next = if count >= self.config.threshold {
            AlarmState::Alarm
        } else {
            AlarmState::Ok
        };
        let raised = window.state == AlarmState::Ok && next == AlarmState::Alarm;
        if window.state == AlarmState::Alarm && next == AlarmState::Ok {
            info!("alarm '{}' back to OK", self.config.name);
        }
        window.state = next;
        (next, count, raised)
    }

    async fn raise(&self, count: usize) {
        warn!("alarm '{}' raised: {} failed runs", self.config.name, count);
        let subject = format!("ALARM: {}", self.config.name);
        let message = format!(
            "Alarm ({}) is raised: {} failed runs within the last {} minutes \
             (threshold {}).",
            self.config.name,
            count,
            self.config.period.as_secs() / 60,
            self.config.threshold,
        );
        if let Err(err) = self.notifier.publish(&subject, &message).await {
            error!("could not deliver alarm '{}': {}", self.config.name, err);
        }
    }
}
