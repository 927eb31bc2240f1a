use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::{ApplicantIdentity, StatusQueryResult, StatusRecord};
use super::sink::{NotificationSink, SinkError};
use super::source::{CaptchaSolver, SourceError, StatusSource};
use super::store::{StatusStore, StoreError};
use super::window::{ActiveHoursPolicy, ActiveWindow};

/// Status gated by active hours when no other list is configured.
pub const DEFAULT_SENSITIVE_STATUS: &str = "Refused";

/// Whether a cycle whose status matches the last recorded one still records
/// and notifies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationPolicy {
    #[default]
    Always,
    OnChange,
}

impl NotificationPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::OnChange => "on-change",
        }
    }
}

impl FromStr for NotificationPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "on-change" | "on_change" | "onchange" => Ok(Self::OnChange),
            other => Err(format!(
                "unknown notification policy '{other}' (expected 'always' or 'on-change')"
            )),
        }
    }
}

/// Gating rules applied by the tracker.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub active_hours: ActiveHoursPolicy,
    pub sensitive_statuses: Vec<String>,
    pub policy: NotificationPolicy,
}

impl TrackerSettings {
    pub fn new(active_hours: ActiveHoursPolicy) -> Self {
        Self {
            active_hours,
            sensitive_statuses: vec![DEFAULT_SENSITIVE_STATUS.to_string()],
            policy: NotificationPolicy::default(),
        }
    }

    pub fn is_sensitive(&self, status: &str) -> bool {
        self.sensitive_statuses.iter().any(|value| value == status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("failed to fetch current status: {0}")]
    FetchFailed(#[source] SourceError),
    #[error("failed to persist status: {0}")]
    PersistFailed(#[source] StoreError),
}

/// A sink that returned an error during dispatch.
#[derive(Debug)]
pub struct SinkFailure {
    pub sink: String,
    pub error: SinkError,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Every sink was attempted; `failures` lists the ones that errored.
    Dispatched {
        delivered: usize,
        failures: Vec<SinkFailure>,
    },
    /// Recorded, but a sensitive status fell outside the active window.
    Gated { window: ActiveWindow },
    /// Same status as last time under [`NotificationPolicy::OnChange`]; nothing
    /// recorded or sent.
    Unchanged,
}

#[derive(Debug)]
pub struct CycleReport {
    pub status: String,
    pub case_last_updated: String,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    /// True when at least one sink failed.
    pub fn is_partial(&self) -> bool {
        matches!(&self.outcome, CycleOutcome::Dispatched { failures, .. } if !failures.is_empty())
    }

    pub fn failures(&self) -> &[SinkFailure] {
        match &self.outcome {
            CycleOutcome::Dispatched { failures, .. } => failures,
            _ => &[],
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status '{}' (last updated {}): ",
            self.status, self.case_last_updated
        )?;
        match &self.outcome {
            CycleOutcome::Dispatched { delivered, failures } if failures.is_empty() => {
                write!(f, "delivered to {delivered} sink(s)")
            }
            CycleOutcome::Dispatched { delivered, failures } => {
                let names: Vec<&str> = failures.iter().map(|failure| failure.sink.as_str()).collect();
                write!(
                    f,
                    "partial delivery, {delivered} ok, {} failed ({})",
                    failures.len(),
                    names.join(", ")
                )
            }
            CycleOutcome::Gated { window } => {
                write!(f, "recorded, outside active hours {window}, no notification sent")
            }
            CycleOutcome::Unchanged => write!(f, "unchanged, nothing recorded or sent"),
        }
    }
}

/// Tracker composing the status lookup, history store, gate, and sinks.
///
/// Runs one cycle per [`StatusTracker::run_cycle`] call. Callers must not run
/// cycles concurrently against the same store.
pub struct StatusTracker<S, T> {
    applicant: ApplicantIdentity,
    source: Arc<S>,
    solver: Arc<dyn CaptchaSolver>,
    store: Arc<T>,
    settings: TrackerSettings,
    clock: Arc<dyn Clock>,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl<S, T> StatusTracker<S, T>
where
    S: StatusSource + 'static,
    T: StatusStore + 'static,
{
    pub fn new(
        applicant: ApplicantIdentity,
        source: Arc<S>,
        solver: Arc<dyn CaptchaSolver>,
        store: Arc<T>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            applicant,
            source,
            solver,
            store,
            settings,
            clock: Arc::new(SystemClock),
            sinks: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sinks are notified in registration order.
    pub fn register_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Fetch, record, gate, and dispatch once.
    ///
    /// A failed fetch or write aborts the cycle before any sink is called.
    /// Sink failures never abort; they are collected in the report.
    pub fn run_cycle(&self) -> Result<CycleReport, TrackingError> {
        let result = self
            .source
            .query(&self.applicant, self.solver.as_ref())
            .map_err(|err| {
                error!(error = %err, "status fetch failed, cycle aborted");
                TrackingError::FetchFailed(err)
            })?;
        info!(
            status = %result.status,
            case_last_updated = %result.case_last_updated,
            "fetched current status"
        );

        if self.settings.policy == NotificationPolicy::OnChange
            && self.is_unchanged(&result.status)?
        {
            info!(status = %result.status, "status unchanged, nothing recorded or sent");
            return Ok(report(&result, CycleOutcome::Unchanged));
        }

        let now = self.clock.now();
        self.store
            .append(StatusRecord::new(result.status.clone(), now))
            .map_err(persist_failed)?;

        if self.settings.is_sensitive(&result.status) && !self.settings.active_hours.permits(now) {
            let window = self.settings.active_hours.window();
            info!(
                status = %result.status,
                active_hours = %window,
                zone = %self.settings.active_hours.zone(),
                "outside active hours, no notification sent"
            );
            return Ok(report(&result, CycleOutcome::Gated { window }));
        }

        let outcome = self.dispatch(&result);
        if let CycleOutcome::Dispatched { delivered, failures } = &outcome {
            if failures.is_empty() {
                info!(delivered, "notifications dispatched");
            } else {
                warn!(
                    delivered,
                    failed = failures.len(),
                    "notifications partially delivered"
                );
            }
        }
        Ok(report(&result, outcome))
    }

    /// A previous record that was held back by the gate never reached the
    /// sinks, so it does not count as already notified.
    fn is_unchanged(&self, status: &str) -> Result<bool, TrackingError> {
        let previous = self.store.last().map_err(persist_failed)?;
        Ok(previous.is_some_and(|record| record.status == status && !self.was_gated(&record)))
    }

    fn was_gated(&self, record: &StatusRecord) -> bool {
        self.settings.is_sensitive(&record.status)
            && !self.settings.active_hours.permits(record.observed_at)
    }

    fn dispatch(&self, result: &StatusQueryResult) -> CycleOutcome {
        let mut delivered = 0;
        let mut failures = Vec::new();

        for sink in &self.sinks {
            match sink.deliver(result) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    warn!(sink = sink.name(), error = %error, "notification delivery failed");
                    failures.push(SinkFailure {
                        sink: sink.name().to_string(),
                        error,
                    });
                }
            }
        }

        CycleOutcome::Dispatched {
            delivered,
            failures,
        }
    }
}

fn report(result: &StatusQueryResult, outcome: CycleOutcome) -> CycleReport {
    CycleReport {
        status: result.status.clone(),
        case_last_updated: result.case_last_updated.clone(),
        outcome,
    }
}

fn persist_failed(err: StoreError) -> TrackingError {
    error!(error = %err, "status history unavailable, cycle aborted");
    TrackingError::PersistFailed(err)
}
