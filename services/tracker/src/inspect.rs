use std::io;

use ceac_tracker::config::AppConfig;
use ceac_tracker::error::AppError;
use ceac_tracker::tracking::{JsonFileStore, StatusRecord, StatusStore};
use chrono::{DateTime, Utc};
use clap::Args;

#[derive(Args, Debug)]
pub(crate) struct HistoryArgs {
    /// Emit CSV with `status,date` columns instead of aligned text
    #[arg(long)]
    csv: bool,
}

#[derive(Args, Debug)]
pub(crate) struct WindowArgs {
    /// Instant to evaluate (RFC 3339); defaults to now
    #[arg(long, value_parser = parse_instant)]
    at: Option<DateTime<Utc>>,
}

pub(crate) fn run_history(config: &AppConfig, args: HistoryArgs) -> Result<(), AppError> {
    let store = JsonFileStore::new(&config.tracking.status_file);
    let history = store.load()?;

    if args.csv {
        write_csv(io::stdout(), history.records())?;
        return Ok(());
    }

    if history.is_empty() {
        println!("no statuses recorded in {}", store.path().display());
        return Ok(());
    }
    for record in history.records() {
        println!("{}  {}", record.observed_at.to_rfc3339(), record.status);
    }
    Ok(())
}

pub(crate) fn run_window(config: &AppConfig, args: WindowArgs) -> Result<(), AppError> {
    let policy = config.tracking.active_hours_policy();
    let at = args.at.unwrap_or_else(Utc::now);
    let verdict = if policy.permits(at) { "inside" } else { "outside" };
    println!(
        "{} is {verdict} active hours {} ({})",
        at.to_rfc3339(),
        policy.window(),
        policy.zone()
    );
    Ok(())
}

fn write_csv<W: io::Write>(out: W, records: &[StatusRecord]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        writer.serialize(record).map_err(io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("invalid instant '{raw}': {err}"))
}
