use std::sync::Arc;
use std::time::Duration;

use ceac_tracker::config::AppConfig;
use ceac_tracker::error::AppError;
use ceac_tracker::tracking::{CycleReport, JsonFileStore, StatusTracker};
use clap::Args;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::infra::{CommandCaptchaSolver, CommandSink, CommandStatusSource, LogSink};

type Tracker = StatusTracker<CommandStatusSource, JsonFileStore>;

#[derive(Args, Debug)]
pub(crate) struct WatchArgs {
    /// Seconds between the start of consecutive cycles
    #[arg(long, default_value_t = 3600, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,
}

pub(crate) async fn run_check(config: &AppConfig) -> Result<(), AppError> {
    let tracker = Arc::new(build_tracker(config)?);
    let report = run_once(tracker).await?;
    println!("{report}");
    Ok(())
}

/// Cycles never overlap: the next tick waits for the running one to finish.
pub(crate) async fn run_watch(config: &AppConfig, args: WatchArgs) -> Result<(), AppError> {
    let tracker = Arc::new(build_tracker(config)?);
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval_secs = args.interval, "watching case status");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_once(Arc::clone(&tracker)).await {
                    Ok(report) if report.is_partial() => warn!(%report, "cycle finished with sink failures"),
                    Ok(report) => info!(%report, "cycle finished"),
                    Err(AppError::Tracking(err)) => error!(error = %err, "cycle failed, retrying next interval"),
                    Err(err) => return Err(err),
                }
            }
            signal = &mut shutdown => {
                signal?;
                info!("interrupt received, stopping watch");
                return Ok(());
            }
        }
    }
}

fn build_tracker(config: &AppConfig) -> Result<Tracker, AppError> {
    let applicant = config.applicant.identity()?;
    let source = Arc::new(CommandStatusSource::from_config(&config.adapters)?);
    let solver = Arc::new(CommandCaptchaSolver::from_config(&config.adapters)?);
    let store = Arc::new(JsonFileStore::new(&config.tracking.status_file));

    let mut tracker = StatusTracker::new(applicant, source, solver, store, config.tracking.settings());
    tracker.register_sink(Arc::new(LogSink));
    for (index, raw) in config.adapters.notify_commands.iter().enumerate() {
        if let Some(sink) = CommandSink::parse(index + 1, raw) {
            tracker.register_sink(Arc::new(sink));
        }
    }

    info!(
        sinks = tracker.sink_count(),
        policy = config.tracking.policy.label(),
        status_file = %config.tracking.status_file.display(),
        "status tracker ready"
    );
    Ok(tracker)
}

/// The adapters block on child processes, so cycles run off the async workers.
async fn run_once(tracker: Arc<Tracker>) -> Result<CycleReport, AppError> {
    let report = tokio::task::spawn_blocking(move || tracker.run_cycle())
        .await
        .map_err(std::io::Error::other)??;
    Ok(report)
}
