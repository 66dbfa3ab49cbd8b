//! `weather-site` CLI entry-point.
//!
//! Available sub-commands:
//! - `run`        : reconcile the site once and print the run report.
//! - `render`     : print the page for a given label.
//! - `serve`      : start the API server.
//! - `schedule`   : fire runs on the configured schedules.
//! - `migrate`    : run pending database migrations.
//! - `init-status`: provision the status parameter if absent.

mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::render::render_page;
use engine::{Reconciler, INITIAL_STATUS};
use scheduler::{
    AlarmConfig, FailureAlarm, HttpTarget, LocalTarget, RunTarget, ScheduleExpression, Scheduler,
};
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "weather-site",
    about = "Keeps an \"is it snowing?\" page in step with the weather",
    version
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the site once.
    Run,
    /// Print the page that would be published for LABEL.
    Render {
        /// "snow", "no snow", ...
        label: String,
    },
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Fire runs on every configured schedule until interrupted.
    Schedule {
        /// ", "-separated rate(..)/cron(..) expressions.
        #[arg(long, env = "SCHEDULES", default_value = "rate(10 minutes)")]
        schedules: String,
        /// Base URL of a `serve` instance; runs in-process when absent.
        #[arg(long, env = "RUN_TARGET_URL")]
        target_url: Option<String>,
    },
    /// Run pending database migrations.
    Migrate,
    /// Write the initial status value unless one is already stored.
    InitStatus,
}

async fn reconciler(settings: &Settings) -> anyhow::Result<Arc<Reconciler>> {
    Ok(Arc::new(Reconciler::new(
        settings.site_config()?,
        settings.collaborators().await?,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Cli { settings, command } = Cli::parse();

    match command {
        Command::Run => {
            let input = settings.workflow_input()?;
            let report = reconciler(&settings).await?.run(&input).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Render { label } => {
            let config = settings.site_config()?;
            let kind = settings.weather_type.trim().to_lowercase();
            print!(
                "{}",
                render_page(&label, &kind, &config.location_name, &config.source_url)
            );
        }
        Command::Serve { bind } => {
            info!("Starting API server on {bind}");
            let state = api::AppState::new(reconciler(&settings).await?);
            api::serve(&bind, state).await?;
        }
        Command::Schedule {
            schedules,
            target_url,
        } => {
            let schedules = ScheduleExpression::parse_list(&schedules)?;
            let payload = settings.payload()?;

            let target: Arc<dyn RunTarget> = match &target_url {
                Some(url) => {
                    info!("Delivering runs to {url}");
                    Arc::new(HttpTarget::new(url, Duration::from_secs(120))?)
                }
                None => Arc::new(LocalTarget::new(reconciler(&settings).await?)),
            };

            let mut scheduler = Scheduler::new(schedules, payload, target);
            if let Some(notifier) = settings.notifier()? {
                let name = format!("{}-weather-site-failures", settings.stack_name);
                scheduler = scheduler.with_alarm(Arc::new(FailureAlarm::new(
                    AlarmConfig::new(name),
                    notifier,
                )));
            }

            for schedule in scheduler.schedules() {
                info!("Schedule: {schedule}");
            }
            Arc::new(scheduler)
                .run(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await;
        }
        Command::Migrate => {
            let database_url = settings
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for migrate")?;
            let pool = db::pool::create_pool(database_url, 2).await?;
            db::pool::run_migrations(&pool).await?;
            info!("Migrations applied successfully");
        }
        Command::InitStatus => {
            let store = settings.status_store().await?;
            let value = store
                .ensure(&settings.status_parameter, INITIAL_STATUS)
                .await
                .context("provisioning the status parameter")?;
            println!("{value}");
        }
    }

    Ok(())
}
