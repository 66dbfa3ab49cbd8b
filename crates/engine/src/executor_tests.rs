//! End-to-end run tests for the reconciler.
//!
//! Every collaborator is a scripted double from `adapters::mock`, so these
//! tests exercise the state table, retry policy and fan-out without any
//! network. Tests that hit the retry path run on a paused clock so the
//! back-off sleeps are virtual.

use std::sync::Arc;

use adapters::mock::{
    MockBehaviour, MockInvalidator, MockNotifier, MockPublisher, MockStatusStore, MockWeather,
};
use adapters::{AdapterError, Notifier};

use crate::config::DEFAULT_STATUS_PARAMETER;
use crate::error::Branch;
use crate::{Collaborators, EngineError, Reconciler, SiteConfig, State, WorkflowInput};

const PARAM: &str = DEFAULT_STATUS_PARAMETER;

struct Harness {
    store: Arc<MockStatusStore>,
    weather: Arc<MockWeather>,
    publisher: Arc<MockPublisher>,
    invalidator: Arc<MockInvalidator>,
    notifier: Option<Arc<MockNotifier>>,
}

impl Harness {
    fn new(previous: &str, weather: MockWeather) -> Self {
        Self::with_store(MockStatusStore::with_value(PARAM, previous), weather)
    }

    fn with_store(store: MockStatusStore, weather: MockWeather) -> Self {
        Self {
            store: Arc::new(store),
            weather: Arc::new(weather),
            publisher: Arc::new(MockPublisher::new()),
            invalidator: Arc::new(MockInvalidator::new()),
            notifier: None,
        }
    }

    fn publisher(mut self, publisher: MockPublisher) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }

    fn invalidator(mut self, invalidator: MockInvalidator) -> Self {
        self.invalidator = Arc::new(invalidator);
        self
    }

    fn notifier(mut self, notifier: MockNotifier) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    fn reconciler(&self) -> Reconciler {
        let notifier = self
            .notifier
            .clone()
            .map(|n| n as Arc<dyn Notifier>);
        Reconciler::new(
            SiteConfig::new("Burlington, VT", "https://openweathermap.org"),
            Collaborators {
                status_store: self.store.clone(),
                weather: self.weather.clone(),
                publisher: self.publisher.clone(),
                invalidator: self.invalidator.clone(),
                notifier,
            },
        )
    }
}

fn snow_input() -> WorkflowInput {
    WorkflowInput::new("snow", "44.26", "-72.57", "TestStack")
}

fn assert_failed_from(err: &EngineError, expected: State) -> &EngineError {
    match err {
        EngineError::Failed { from, cause } => {
            assert_eq!(*from, expected);
            cause
        }
        other => panic!("expected a run routed to Failure, got {other:?}"),
    }
}

// ============================================================
// Unchanged status
// ============================================================

#[tokio::test]
async fn matching_status_reaches_up_to_date_without_side_effects() {
    let harness = Harness::new("snow", MockWeather::returning("Snow")).notifier(MockNotifier::new());

    let report = harness.reconciler().run(&snow_input()).await.expect("run succeeds");

    assert!(!report.changed);
    assert_eq!(
        report.states,
        vec![State::ReadStatus, State::FetchWeather, State::CompareStatus, State::UpToDate]
    );
    assert_eq!(report.previous_status, "snow");
    assert_eq!(report.current_status, "snow");

    assert!(harness.store.writes().is_empty());
    assert!(harness.publisher.objects().is_empty());
    assert!(harness.invalidator.calls().is_empty());
    assert_eq!(harness.notifier.as_ref().unwrap().call_count(), 0);
}

// ============================================================
// Changed status
// ============================================================

#[tokio::test]
async fn changed_status_publishes_page_and_fans_out() {
    let harness = Harness::new("snow", MockWeather::returning("Clear")).notifier(MockNotifier::new());

    let report = harness.reconciler().run(&snow_input()).await.expect("run succeeds");

    assert!(report.changed);
    assert_eq!(report.current_status, "no snow");
    assert_eq!(
        report.states,
        vec![
            State::ReadStatus,
            State::FetchWeather,
            State::CompareStatus,
            State::UpdateSite,
            State::FinishUpdate,
        ]
    );

    let objects = harness.publisher.objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].key, "index.html");
    assert_eq!(objects[0].content_type, "text/html");
    assert!(objects[0].body.contains("<h1>NO.</h1>"));
    assert!(objects[0].body.contains(r#"class="green""#));

    assert_eq!(harness.store.writes(), vec![(PARAM.to_string(), "no snow".to_string())]);

    let invalidations = harness.invalidator.calls();
    assert_eq!(invalidations.len(), 1);
    assert_eq!(invalidations[0].0, vec!["/index.html".to_string()]);
    assert!(invalidations[0].1.starts_with(&report.run_id.to_string()));

    let messages = harness.notifier.as_ref().unwrap().messages();
    assert_eq!(messages.len(), 1);
    let (subject, body) = &messages[0];
    assert!(subject.contains("TestStack"));
    assert!(body.contains("'snow'"));
    assert!(body.contains("'no snow'"));
}

#[tokio::test]
async fn without_notifier_only_two_branches_run() {
    let harness = Harness::new("no snow", MockWeather::returning("Snow"));

    let report = harness.reconciler().run(&snow_input()).await.expect("run succeeds");

    assert!(report.changed);
    assert_eq!(harness.store.value(PARAM).as_deref(), Some("snow"));
    assert_eq!(harness.invalidator.calls().len(), 1);
    assert!(harness.publisher.objects()[0].body.contains("<h1>YES!!!</h1>"));
}

#[tokio::test]
async fn sentinel_status_is_replaced_on_first_run() {
    let harness = Harness::new(crate::INITIAL_STATUS, MockWeather::returning("Clouds"));

    let report = harness.reconciler().run(&snow_input()).await.expect("run succeeds");

    assert_eq!(report.previous_status, "Initial value");
    assert_eq!(harness.store.value(PARAM).as_deref(), Some("no snow"));
}

#[tokio::test]
async fn same_input_publishes_identical_pages() {
    let first = Harness::new("snow", MockWeather::returning("Clear"));
    let second = Harness::new("snow", MockWeather::returning("Clear"));

    first.reconciler().run(&snow_input()).await.unwrap();
    second.reconciler().run(&snow_input()).await.unwrap();

    assert_eq!(first.publisher.objects()[0].body, second.publisher.objects()[0].body);
}

// ============================================================
// FetchWeather retries
// ============================================================

#[tokio::test(start_paused = true)]
async fn fetch_succeeds_on_fourth_attempt_after_three_failures() {
    let harness = Harness::new(
        "snow",
        MockWeather::scripted("Snow", MockBehaviour::transient_failures(3)),
    );

    let report = harness.reconciler().run(&snow_input()).await.expect("fourth attempt succeeds");

    assert!(!report.changed);
    assert_eq!(harness.weather.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn fetch_retry_bound_allows_at_most_three_failures() {
    for failures in 0..=4u32 {
        let harness = Harness::new(
            "snow",
            MockWeather::scripted("Snow", MockBehaviour::transient_failures(failures)),
        );

        let result = harness.reconciler().run(&snow_input()).await;

        if failures <= 3 {
            assert!(result.is_ok(), "{failures} failures should be absorbed");
            assert_eq!(harness.weather.call_count(), failures + 1);
        } else {
            assert!(matches!(
                result,
                Err(EngineError::RetryExhausted { state: State::FetchWeather, attempts: 4, .. })
            ));
            assert_eq!(harness.weather.call_count(), 4);
            assert!(harness.publisher.objects().is_empty());
        }
    }
}

#[tokio::test]
async fn malformed_weather_payload_fails_without_retry() {
    let harness = Harness::new(
        "snow",
        MockWeather::scripted(
            "",
            MockBehaviour::Always(AdapterError::fatal("No weather data found")),
        ),
    );

    let err = harness.reconciler().run(&snow_input()).await.unwrap_err();

    assert!(matches!(err, EngineError::StateFatal { state: State::FetchWeather, .. }));
    assert_eq!(harness.weather.call_count(), 1);
    assert!(harness.store.writes().is_empty());
}

#[tokio::test]
async fn read_status_failure_fails_the_run_directly() {
    let store = MockStatusStore::with_value(PARAM, "snow")
        .failing_reads(MockBehaviour::Always(AdapterError::retryable("throttled")));
    let harness = Harness::with_store(store, MockWeather::returning("Snow"));

    let err = harness.reconciler().run(&snow_input()).await.unwrap_err();

    assert!(matches!(err, EngineError::StateFailed { state: State::ReadStatus, .. }));
    assert_eq!(harness.weather.call_count(), 0);
}

// ============================================================
// UpdateSite retries
// ============================================================

#[tokio::test(start_paused = true)]
async fn update_retry_bound_allows_at_most_three_failures() {
    for failures in 0..=4u32 {
        let harness = Harness::new("snow", MockWeather::returning("Clear"))
            .publisher(MockPublisher::scripted(MockBehaviour::transient_failures(failures)));

        let result = harness.reconciler().run(&snow_input()).await;

        assert_eq!(harness.publisher.call_count(), (failures + 1).min(4));
        if failures <= 3 {
            assert!(result.is_ok(), "{failures} failures should be absorbed");
            assert_eq!(harness.store.value(PARAM).as_deref(), Some("no snow"));
        } else {
            let err = result.unwrap_err();
            let cause = assert_failed_from(&err, State::UpdateSite);
            assert!(matches!(cause, EngineError::RetryExhausted { attempts: 4, .. }));
            // Nothing downstream of the failed publish ran.
            assert!(harness.store.writes().is_empty());
            assert!(harness.invalidator.calls().is_empty());
        }
    }
}

// ============================================================
// FinishUpdate branch failures
// ============================================================

#[tokio::test]
async fn failed_invalidation_fails_run_but_keeps_status_write() {
    let harness = Harness::new("snow", MockWeather::returning("Clear")).invalidator(
        MockInvalidator::scripted(MockBehaviour::Always(AdapterError::retryable("CDN unavailable"))),
    );

    let err = harness.reconciler().run(&snow_input()).await.unwrap_err();

    let cause = assert_failed_from(&err, State::FinishUpdate);
    match cause {
        EngineError::FanOut { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].branch, Branch::Invalidate);
        }
        other => panic!("expected fan-out failure, got {other:?}"),
    }
    assert_eq!(harness.store.value(PARAM).as_deref(), Some("no snow"));

    // The next scheduled run sees the converged status and does nothing.
    let next = Harness {
        store: harness.store.clone(),
        weather: Arc::new(MockWeather::returning("Clear")),
        publisher: Arc::new(MockPublisher::new()),
        invalidator: Arc::new(MockInvalidator::new()),
        notifier: None,
    };
    let report = next.reconciler().run(&snow_input()).await.expect("run succeeds");
    assert!(!report.changed);
    assert_eq!(report.previous_status, "no snow");
    assert!(next.publisher.objects().is_empty());
}

#[tokio::test]
async fn failed_notification_alone_fails_the_run() {
    let harness = Harness::new("snow", MockWeather::returning("Clear"))
        .notifier(MockNotifier::scripted(MockBehaviour::Always(AdapterError::fatal("bad recipient"))));

    let err = harness.reconciler().run(&snow_input()).await.unwrap_err();

    let cause = assert_failed_from(&err, State::FinishUpdate);
    assert!(matches!(
        cause,
        EngineError::FanOut { failures } if failures.len() == 1 && failures[0].branch == Branch::Notify
    ));
    assert_eq!(harness.store.value(PARAM).as_deref(), Some("no snow"));
    assert_eq!(harness.invalidator.calls().len(), 1);
}

#[tokio::test]
async fn failed_status_write_still_attempts_siblings() {
    let store = MockStatusStore::with_value(PARAM, "snow")
        .failing_writes(MockBehaviour::Always(AdapterError::retryable("throttled")));
    let harness = Harness::with_store(store, MockWeather::returning("Clear")).notifier(MockNotifier::new());

    let err = harness.reconciler().run(&snow_input()).await.unwrap_err();

    let cause = assert_failed_from(&err, State::FinishUpdate);
    assert!(matches!(
        cause,
        EngineError::FanOut { failures } if failures[0].branch == Branch::StatusWrite
    ));
    assert_eq!(harness.store.value(PARAM).as_deref(), Some("snow"));
    assert_eq!(harness.invalidator.calls().len(), 1);
    assert_eq!(harness.notifier.as_ref().unwrap().messages().len(), 1);
}

// ============================================================
// Status helpers
// ============================================================

#[tokio::test]
async fn ensure_status_provisions_sentinel_only_once() {
    let store = Arc::new(MockStatusStore::with_value("other", "x"));
    let harness = Harness {
        store: store.clone(),
        weather: Arc::new(MockWeather::returning("Snow")),
        publisher: Arc::new(MockPublisher::new()),
        invalidator: Arc::new(MockInvalidator::new()),
        notifier: None,
    };
    let reconciler = harness.reconciler();

    assert_eq!(reconciler.ensure_status().await.unwrap().value, "Initial value");
    store_put(&store, "snow").await;
    assert_eq!(reconciler.ensure_status().await.unwrap().value, "snow");
    assert_eq!(reconciler.current_status().await.unwrap().value, "snow");
}

async fn store_put(store: &MockStatusStore, value: &str) {
    use adapters::StatusStore;
    store.put(PARAM, value).await.unwrap();
}
