//! The schedule loop: one timer per expression, one dispatch per tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use engine::TriggerPayload;

use crate::alarm::FailureAlarm;
use crate::expression::ScheduleExpression;
use crate::target::{RunResult, RunTarget};
use crate::InvocationError;

/// How a single tick is delivered to its target.
#[derive(Debug, Clone)]
pub struct InvocationPolicy {
    /// A tick older than this is discarded instead of delivered.
    pub max_event_age: Duration,
    /// Extra delivery attempts after a transient invocation error.
    pub max_retries: u32,
    /// Delay before the first redelivery; doubles each time.
    pub retry_base_delay: Duration,
}

impl Default for InvocationPolicy {
    fn default() -> Self {
        Self {
            max_event_age: Duration::from_secs(90),
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The tick aged out before it could be delivered.
    Expired,
    /// The target started a run; carries how it ended.
    Delivered(RunResult),
    /// Delivery was given up on.
    Dropped(InvocationError),
}

pub struct Scheduler {
    schedules: Vec<ScheduleExpression>,
    payload: TriggerPayload,
    target: Arc<dyn RunTarget>,
    policy: InvocationPolicy,
    alarm: Option<Arc<FailureAlarm>>,
    shutdown_grace: Duration,
}

/// How long `run` waits for in-flight runs after shutdown is requested.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5 * 60);

impl Scheduler {
    pub fn new(
        schedules: Vec<ScheduleExpression>,
        payload: TriggerPayload,
        target: Arc<dyn RunTarget>,
    ) -> Self {
        Self {
            schedules,
            payload,
            target,
            policy: InvocationPolicy::default(),
            alarm: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_policy(mut self, policy: InvocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_alarm(mut self, alarm: Arc<FailureAlarm>) -> Self {
        self.alarm = Some(alarm);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn schedules(&self) -> &[ScheduleExpression] {
        &self.schedules
    }

    /// Deliver the tick that was due at `scheduled_for`.
    #[instrument(skip(self), fields(stack = %self.payload.stack_name))]
    pub async fn dispatch(&self, scheduled_for: DateTime<Utc>) -> DispatchOutcome {
        let mut attempt: u32 = 0;

        let outcome = loop {
            let age = Utc::now()
                .signed_duration_since(scheduled_for)
                .to_std()
                .unwrap_or_default();
            if age > self.policy.max_event_age {
                warn!("tick expired after {}s, discarding", age.as_secs());
                break DispatchOutcome::Expired;
            }

            match self.target.invoke(&self.payload).await {
                Ok(result) => break DispatchOutcome::Delivered(result),
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.retry_base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        "delivery attempt {} failed: {}. Retrying in {:?}",
                        attempt, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!("dropping tick: {}", err);
                    break DispatchOutcome::Dropped(err);
                }
            }
        };

        if let DispatchOutcome::Delivered(RunResult::Failed(reason)) = &outcome {
            error!("run failed: {}", reason);
            if let Some(alarm) = &self.alarm {
                alarm.record_failure(Utc::now()).await;
            }
        }
        outcome
    }

    /// Drive every schedule until `shutdown` resolves.
    ///
    /// Ticks are dispatched on their own tasks, so a slow run never delays
    /// the next tick and runs may overlap. On shutdown, runs already in
    /// flight get up to the shutdown grace period to finish before they are
    /// aborted.
    pub async fn run<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let (tick_tx, mut ticks) = mpsc::unbounded_channel();
        let mut loops = JoinSet::new();
        for index in 0..self.schedules.len() {
            loops.spawn(Arc::clone(&self).tick_loop(index, tick_tx.clone()));
        }
        drop(tick_tx);
        info!("scheduler started with {} schedule(s)", self.schedules.len());

        let mut in_flight = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("scheduler shutting down");
                    break;
                }
                tick = ticks.recv() => match tick {
                    Some(scheduled_for) => {
                        let this = Arc::clone(&self);
                        in_flight.spawn(async move { this.dispatch(scheduled_for).await });
                    }
                    None => {
                        warn!("no schedule has a future fire time; stopping");
                        break;
                    }
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }
        loops.abort_all();
        self.drain(in_flight).await;
    }

    async fn drain(&self, mut in_flight: JoinSet<DispatchOutcome>) {
        if in_flight.is_empty() {
            return;
        }
        info!("waiting for {} run(s) still in flight", in_flight.len());
        let finished = tokio::time::timeout(self.shutdown_grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            warn!(
                "aborting {} run(s) still in flight after {:?}",
                in_flight.len(),
                self.shutdown_grace
            );
            in_flight.shutdown().await;
        }
    }

    async fn tick_loop(self: Arc<Self>, index: usize, ticks: mpsc::UnboundedSender<DateTime<Utc>>) {
        let schedule = &self.schedules[index];
        loop {
            let now = Utc::now();
            let Some(next) = schedule.next_after(now) else {
                info!("schedule '{}' has no further fire times", schedule);
                return;
            };
            let wait = next.signed_duration_since(now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            info!("schedule '{}' fired", schedule);
            if ticks.send(next).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmConfig, AlarmState};
    use adapters::mock::MockNotifier;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed list of responses, then succeeds.
    #[derive(Default)]
    struct ScriptedTarget {
        script: Mutex<VecDeque<Result<RunResult, InvocationError>>>,
        calls: Mutex<Vec<TriggerPayload>>,
    }

    impl ScriptedTarget {
        fn new(script: Vec<Result<RunResult, InvocationError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::default(),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RunTarget for ScriptedTarget {
        async fn invoke(&self, payload: &TriggerPayload) -> Result<RunResult, InvocationError> {
            self.calls.lock().unwrap().push(payload.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(RunResult::Succeeded))
        }
    }

    fn payload() -> TriggerPayload {
        TriggerPayload {
            weather_type: "snow".into(),
            latitude: "47.6".into(),
            longitude: "-122.3".into(),
            stack_name: "TestStack".into(),
        }
    }

    fn scheduler(target: Arc<ScriptedTarget>) -> Scheduler {
        let schedules = ScheduleExpression::parse_list("rate(10 minutes)").unwrap();
        Scheduler::new(schedules, payload(), target)
    }

    fn transient() -> Result<RunResult, InvocationError> {
        Err(InvocationError::Transient("503".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_the_configured_payload() {
        let target = ScriptedTarget::new(vec![]);
        let outcome = scheduler(target.clone()).dispatch(Utc::now()).await;

        assert_eq!(outcome, DispatchOutcome::Delivered(RunResult::Succeeded));
        assert_eq!(target.calls.lock().unwrap()[0], payload());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_invocation_errors_twice() {
        let target = ScriptedTarget::new(vec![transient(), transient()]);
        let start = tokio::time::Instant::now();
        let outcome = scheduler(target.clone()).dispatch(Utc::now()).await;

        assert_eq!(outcome, DispatchOutcome::Delivered(RunResult::Succeeded));
        assert_eq!(target.call_count(), 3);
        // 1s + 2s between attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retry_budget() {
        let target = ScriptedTarget::new(vec![transient(), transient(), transient()]);
        let outcome = scheduler(target.clone()).dispatch(Utc::now()).await;

        assert!(matches!(outcome, DispatchOutcome::Dropped(InvocationError::Transient(_))));
        assert_eq!(target.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_invocations_are_not_retried() {
        let target =
            ScriptedTarget::new(vec![Err(InvocationError::Rejected("bad payload".into()))]);
        let outcome = scheduler(target.clone()).dispatch(Utc::now()).await;

        assert!(matches!(outcome, DispatchOutcome::Dropped(InvocationError::Rejected(_))));
        assert_eq!(target.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ticks_are_discarded() {
        let target = ScriptedTarget::new(vec![]);
        let outcome = scheduler(target.clone())
            .dispatch(Utc::now() - chrono::Duration::seconds(91))
            .await;

        assert_eq!(outcome, DispatchOutcome::Expired);
        assert_eq!(target.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_runs_feed_the_alarm() {
        let failed = || Ok(RunResult::Failed("UpdateSite".into()));
        let target = ScriptedTarget::new(vec![failed(), failed()]);
        let notifier = Arc::new(MockNotifier::new());
        let alarm = Arc::new(FailureAlarm::new(
            AlarmConfig::new("TestStack-failures"),
            notifier.clone(),
        ));
        let scheduler = scheduler(target).with_alarm(alarm.clone());

        scheduler.dispatch(Utc::now()).await;
        assert!(notifier.messages().is_empty());
        scheduler.dispatch(Utc::now()).await;

        assert_eq!(notifier.messages().len(), 1);
        assert_eq!(alarm.evaluate(Utc::now()).await, AlarmState::Alarm);
    }

    #[tokio::test(start_paused = true)]
    async fn run_fires_once_per_interval_until_shutdown() {
        let target = ScriptedTarget::new(vec![]);
        let scheduler = Arc::new(scheduler(target.clone()));

        scheduler
            .run(tokio::time::sleep(Duration::from_secs(25 * 60)))
            .await;

        assert_eq!(target.call_count(), 2);
    }

    /// Takes `duration` to finish each run.
    struct SlowTarget {
        duration: Duration,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl SlowTarget {
        fn new(duration: Duration) -> Arc<Self> {
            Arc::new(Self {
                duration,
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RunTarget for SlowTarget {
        async fn invoke(&self, _payload: &TriggerPayload) -> Result<RunResult, InvocationError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.duration).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(RunResult::Succeeded)
        }
    }

    fn slow_scheduler(target: Arc<SlowTarget>) -> Scheduler {
        let schedules = ScheduleExpression::parse_list("rate(10 minutes)").unwrap();
        Scheduler::new(schedules, payload(), target)
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_runs_in_flight() {
        let target = SlowTarget::new(Duration::from_secs(30));

        Arc::new(slow_scheduler(target.clone()))
            .run(tokio::time::sleep(Duration::from_secs(10 * 60 + 5)))
            .await;

        assert_eq!(target.started.load(Ordering::SeqCst), 1);
        assert_eq!(target.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_runs_that_outlast_the_grace_period() {
        let target = SlowTarget::new(Duration::from_secs(60 * 60));
        let scheduler = slow_scheduler(target.clone()).with_shutdown_grace(Duration::from_secs(60));
        let start = tokio::time::Instant::now();

        Arc::new(scheduler)
            .run(tokio::time::sleep(Duration::from_secs(10 * 60 + 5)))
            .await;

        assert_eq!(target.started.load(Ordering::SeqCst), 1);
        assert_eq!(target.finished.load(Ordering::SeqCst), 0);
        assert_eq!(start.elapsed(), Duration::from_secs(11 * 60 + 5));
    }
}
