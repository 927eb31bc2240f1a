use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::tracking::{
    ActiveHoursPolicy, ActiveWindow, ApplicantIdentity, CaptchaError, CaptchaSolver, Clock,
    NotificationSink, SinkError, SourceError, StatusHistory, StatusQueryResult, StatusRecord,
    StatusSource, StatusStore, StatusTracker, StoreError, TrackerSettings, WindowZone,
};

/// Log sink for asserting on emitted diagnostics.
#[derive(Clone, Default)]
pub(super) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub(super) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log mutex")).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log mutex").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return what it logged.
pub(super) fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

pub(super) fn applicant() -> ApplicantIdentity {
    ApplicantIdentity {
        location: "BEJ".to_string(),
        case_number: "AA00ABCDEF".to_string(),
        passport_number: "E12345678".to_string(),
        surname: "ZHANG".to_string(),
    }
}

/// 2025-06-02 at the given UTC wall time.
pub(super) fn utc(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn active_hours(window: &str, zone: Tz) -> ActiveHoursPolicy {
    ActiveHoursPolicy::new(
        ActiveWindow::parse(window).expect("valid window"),
        WindowZone::Named(zone),
    )
}

pub(super) fn settings(window: &str) -> TrackerSettings {
    TrackerSettings::new(active_hours(window, Tz::UTC))
}

pub(super) fn query_result(status: &str) -> StatusQueryResult {
    let mut result = StatusQueryResult::new(status, "02-Jun-2025");
    result
        .details
        .insert("application_num".to_string(), "AA00ABCDEF".into());
    result
}

/// Returns the same response every cycle; solves a captcha first like the real lookup.
pub(super) struct ScriptedSource {
    response: Mutex<Result<StatusQueryResult, String>>,
    calls: Mutex<usize>,
}

impl ScriptedSource {
    pub(super) fn returning(status: &str) -> Self {
        Self {
            response: Mutex::new(Ok(query_result(status))),
            calls: Mutex::new(0),
        }
    }

    pub(super) fn failing(reason: &str) -> Self {
        Self {
            response: Mutex::new(Err(reason.to_string())),
            calls: Mutex::new(0),
        }
    }

    pub(super) fn set_status(&self, status: &str) {
        *self.response.lock().expect("source mutex") = Ok(query_result(status));
    }

    pub(super) fn calls(&self) -> usize {
        *self.calls.lock().expect("source mutex")
    }
}

impl StatusSource for ScriptedSource {
    fn query(
        &self,
        _applicant: &ApplicantIdentity,
        solver: &dyn CaptchaSolver,
    ) -> Result<StatusQueryResult, SourceError> {
        *self.calls.lock().expect("source mutex") += 1;
        solver.solve(b"captcha-image")?;
        self.response
            .lock()
            .expect("source mutex")
            .clone()
            .map_err(SourceError::Transport)
    }
}

pub(super) struct FixedSolver;

impl CaptchaSolver for FixedSolver {
    fn solve(&self, _image: &[u8]) -> Result<String, CaptchaError> {
        Ok("7K2QF".to_string())
    }
}

pub(super) struct BrokenSolver;

impl CaptchaSolver for BrokenSolver {
    fn solve(&self, _image: &[u8]) -> Result<String, CaptchaError> {
        Err(CaptchaError::Unsolved("model returned no characters".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    history: Mutex<StatusHistory>,
    reject_writes: bool,
}

impl MemoryStore {
    pub(super) fn seeded(statuses: &[&str]) -> Self {
        let history = statuses
            .iter()
            .enumerate()
            .map(|(index, status)| StatusRecord::new(*status, utc(index as u32, 0)))
            .collect();
        Self {
            history: Mutex::new(history),
            reject_writes: false,
        }
    }

    pub(super) fn read_only() -> Self {
        Self {
            history: Mutex::new(StatusHistory::default()),
            reject_writes: true,
        }
    }

    pub(super) fn statuses(&self) -> Vec<String> {
        self.history
            .lock()
            .expect("store mutex")
            .records()
            .iter()
            .map(|record| record.status.clone())
            .collect()
    }

    pub(super) fn snapshot(&self) -> StatusHistory {
        self.history.lock().expect("store mutex").clone()
    }
}

impl StatusStore for MemoryStore {
    fn load(&self) -> Result<StatusHistory, StoreError> {
        Ok(self.snapshot())
    }

    fn append(&self, record: StatusRecord) -> Result<(), StoreError> {
        if self.reject_writes {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.history.lock().expect("store mutex").push(record);
        Ok(())
    }
}

pub(super) struct RecordingSink {
    name: String,
    fail: bool,
    deliveries: Mutex<Vec<StatusQueryResult>>,
}

impl RecordingSink {
    pub(super) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: false,
            deliveries: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: true,
            deliveries: Mutex::new(Vec::new()),
        })
    }

    /// Attempts, including failed ones.
    pub(super) fn deliveries(&self) -> Vec<StatusQueryResult> {
        self.deliveries.lock().expect("sink mutex").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, result: &StatusQueryResult) -> Result<(), SinkError> {
        self.deliveries
            .lock()
            .expect("sink mutex")
            .push(result.clone());
        if self.fail {
            return Err(SinkError::Transport("smtp connection refused".to_string()));
        }
        Ok(())
    }
}

pub(super) struct FixedClock(pub(super) DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(super) fn tracker(
    source: &Arc<ScriptedSource>,
    store: &Arc<MemoryStore>,
    settings: TrackerSettings,
    now: DateTime<Utc>,
) -> StatusTracker<ScriptedSource, MemoryStore> {
    StatusTracker::new(
        applicant(),
        source.clone(),
        Arc::new(FixedSolver),
        store.clone(),
        settings,
    )
    .with_clock(Arc::new(FixedClock(now)))
}
