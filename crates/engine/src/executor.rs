//! Reconciliation driver.
//!
//! `Reconciler` walks the [`StateTable`] one state at a time:
//! 1. Task states call one collaborator, wrapped in the state's retry policy.
//! 2. The choice state compares the stored status with the observed label.
//! 3. The parallel state fans out to the status write, the cache
//!    invalidation and (optionally) the notification, then joins on all.
//! 4. Failures are routed through the state's `catch` target when it has
//!    one; otherwise they fail the run directly.

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use adapters::AdapterError;

use crate::config::{Collaborators, SiteConfig};
use crate::error::{Branch, BranchFailure};
use crate::machine::{State, StateKind, StateSpec, StateTable};
use crate::models::{CurrentWeather, RunReport, SiteStatus, WorkflowInput, INITIAL_STATUS};
use crate::render::{render_page, PAGE_CONTENT_TYPE};
use crate::retry::run_once;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Per-run context
// ---------------------------------------------------------------------------

struct RunContext<'a> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    input: &'a WorkflowInput,
    visited: Vec<State>,
    previous: Option<String>,
    current: Option<CurrentWeather>,
    failure: Option<EngineError>,
}

impl<'a> RunContext<'a> {
    fn new(input: &'a WorkflowInput) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            input,
            visited: Vec::new(),
            previous: None,
            current: None,
            failure: None,
        }
    }

    fn previous(&self, state: State) -> Result<&str, EngineError> {
        self.previous
            .as_deref()
            .ok_or_else(|| missing(state, "stored status"))
    }

    fn label(&self, state: State) -> Result<&str, EngineError> {
        self.current
            .as_ref()
            .map(|weather| weather.label.as_str())
            .ok_or_else(|| missing(state, "current weather"))
    }

    fn report(self, changed: bool) -> RunReport {
        RunReport {
            run_id: self.run_id,
            stack_label: self.input.stack_label.clone(),
            started_at: self.started_at,
            states: self.visited,
            previous_status: self.previous.unwrap_or_default(),
            current_status: self.current.map(|w| w.label).unwrap_or_default(),
            changed,
        }
    }
}

fn missing(state: State, what: &str) -> EngineError {
    EngineError::StateFailed {
        state,
        source: AdapterError::fatal(format!("{what} not available in '{state}'")),
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Runs the reconciliation state machine against one site.
///
/// Holds no per-run state, so a single instance can serve overlapping runs.
pub struct Reconciler {
    config: SiteConfig,
    collaborators: Collaborators,
    table: StateTable,
}

impl Reconciler {
    pub fn new(config: SiteConfig, collaborators: Collaborators) -> Self {
        let table = StateTable::new(config.fetch_retry.clone(), config.update_retry.clone());
        Self {
            config,
            collaborators,
            table,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Read the stored status without starting a run.
    pub async fn current_status(&self) -> Result<SiteStatus, EngineError> {
        let value = run_once(
            State::ReadStatus,
            self.collaborators
                .status_store
                .get(&self.config.status_parameter),
        )
        .await?;
        Ok(SiteStatus { value })
    }

    /// Provision the status parameter with the sentinel value if it is absent.
    pub async fn ensure_status(&self) -> Result<SiteStatus, EngineError> {
        let value = run_once(
            State::ReadStatus,
            self.collaborators
                .status_store
                .ensure(&self.config.status_parameter, INITIAL_STATUS),
        )
        .await?;
        Ok(SiteStatus { value })
    }

    /// The page that would be published for `label`.
    pub fn render(&self, label: &str, weather_kind: &str) -> String {
        render_page(
            label,
            weather_kind,
            &self.config.location_name,
            &self.config.source_url,
        )
    }

    /// Execute one run from the initial state to a terminal state.
    ///
    /// # Errors
    /// ReadStatus and FetchWeather failures are returned as-is. Failures in
    /// UpdateSite or FinishUpdate are routed through the Failure state and
    /// returned as [`EngineError::Failed`].
    #[instrument(skip(self, input), fields(stack = %input.stack_label, kind = %input.weather_kind))]
    pub async fn run(&self, input: &WorkflowInput) -> Result<RunReport, EngineError> {
        let mut ctx = RunContext::new(input);
        let mut state = State::INITIAL;
        info!("run {} started", ctx.run_id);

        loop {
            ctx.visited.push(state);
            let spec = self.table.spec(state);

            match spec.kind {
                StateKind::Succeed => {
                    info!("run {} up to date ({:?})", ctx.run_id, ctx.previous);
                    return Ok(ctx.report(false));
                }

                StateKind::Fail => {
                    let err = ctx.failure.take().unwrap_or_else(|| missing(state, "failure cause"));
                    error!("run {} failed (states {:?}): {}", ctx.run_id, ctx.visited, err);
                    return Err(err);
                }

                StateKind::Choice { when_equal, otherwise } => {
                    let unchanged = ctx.previous(state)? == ctx.label(state)?;
                    state = if unchanged { when_equal } else { otherwise };
                }

                StateKind::Task | StateKind::Parallel => {
                    match self.execute(state, spec, &mut ctx).await {
                        Ok(()) => match spec.next {
                            Some(next) => state = next,
                            None => {
                                info!(
                                    "run {} updated site: '{}' -> '{}'",
                                    ctx.run_id,
                                    ctx.previous.as_deref().unwrap_or_default(),
                                    ctx.label(state)?
                                );
                                return Ok(ctx.report(true));
                            }
                        },
                        Err(err) => {
                            let Some(handler) = spec.catch else {
                                error!("run {} failed in '{}': {}", ctx.run_id, state, err);
                                return Err(err);
                            };
                            warn!("state '{}' failed, routing to '{}': {}", state, handler, err);
                            ctx.failure = Some(EngineError::Failed {
                                from: state,
                                cause: Box::new(err),
                            });
                            state = handler;
                        }
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal: state bodies
    // -----------------------------------------------------------------------

    async fn execute(
        &self,
        state: State,
        spec: &StateSpec,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), EngineError> {
        let store = &self.collaborators.status_store;

        match state {
            State::ReadStatus => {
                let value = self
                    .attempt(state, spec, || store.get(&self.config.status_parameter))
                    .await?;
                ctx.previous = Some(value);
            }

            State::FetchWeather => {
                let input = ctx.input;
                let weather = &self.collaborators.weather;
                let raw = self
                    .attempt(state, spec, || {
                        weather.current_condition(&input.latitude, &input.longitude)
                    })
                    .await?;
                let current = CurrentWeather::classify(&raw, &input.weather_kind);
                info!("current weather is '{}', label '{}'", raw, current.label);
                ctx.current = Some(current);
            }

            State::UpdateSite => {
                let page = self.render(ctx.label(state)?, &ctx.input.weather_kind);
                let publisher = &self.collaborators.publisher;
                let key = self.config.page_key.as_str();
                self.attempt(state, spec, || {
                    publisher.put_object(key, page.clone(), PAGE_CONTENT_TYPE)
                })
                .await?;
            }

            State::FinishUpdate => self.finish_update(state, ctx).await?,

            other => return Err(missing(other, "task body")),
        }

        Ok(())
    }

    async fn attempt<T, F, Fut>(&self, state: State, spec: &StateSpec, mut op: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, AdapterError>>,
    {
        match &spec.retry {
            Some(policy) => policy.run(state, op).await,
            None => run_once(state, op()).await,
        }
    }

    /// Run every branch to completion and fail if any of them failed.
    /// Branches that succeeded are not undone.
    async fn finish_update(&self, state: State, ctx: &RunContext<'_>) -> Result<(), EngineError> {
        let previous = ctx.previous(state)?;
        let label = ctx.label(state)?;
        let stack = ctx.input.stack_label.as_str();
        let caller_reference = format!("{}-{}", ctx.run_id, Utc::now().timestamp_millis());
        let subject = format!("Weather update for {stack}");
        let message = format!("Status for {stack} changed from '{previous}' to '{label}'.");

        let store = &self.collaborators.status_store;
        let invalidator = &self.collaborators.invalidator;
        let parameter = self.config.status_parameter.as_str();
        let paths = self.config.invalidation_paths.as_slice();

        let mut branches: Vec<BoxFuture<'_, (Branch, Result<(), AdapterError>)>> = vec![
            async { (Branch::StatusWrite, store.put(parameter, label).await) }.boxed(),
            async {
                (
                    Branch::Invalidate,
                    invalidator.invalidate(paths, &caller_reference).await,
                )
            }
            .boxed(),
        ];
        if let Some(notifier) = &self.collaborators.notifier {
            branches.push(async { (Branch::Notify, notifier.publish(&subject, &message).await) }.boxed());
        }

        let failures: Vec<BranchFailure> = join_all(branches)
            .await
            .into_iter()
            .filter_map(|(branch, result)| {
                result.err().map(|error| BranchFailure { branch, error })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::FanOut { failures })
        }
    }
}
