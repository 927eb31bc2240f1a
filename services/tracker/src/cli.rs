use crate::inspect::{run_history, run_window, HistoryArgs, WindowArgs};
use crate::watch::{run_check, run_watch, WatchArgs};
use ceac_tracker::config::AppConfig;
use ceac_tracker::error::AppError;
use ceac_tracker::telemetry;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ceac-tracker",
    about = "Check a visa case status, keep its history, and notify on changes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one status cycle (default command)
    Check,
    /// Run status cycles back to back on a fixed interval until interrupted
    Watch(WatchArgs),
    /// Print the recorded status history
    History(HistoryArgs),
    /// Report whether an instant falls inside the configured active hours
    Window(WindowArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command.unwrap_or(Command::Check) {
        Command::Check => run_check(&config).await,
        Command::Watch(args) => run_watch(&config, args).await,
        Command::History(args) => run_history(&config, args),
        Command::Window(args) => run_window(&config, args),
    }
}
