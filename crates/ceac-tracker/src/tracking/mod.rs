//! Case status tracking.
//!
//! One status cycle fetches the current status from a [`StatusSource`], appends it
//! to the [`StatusStore`], applies the active-hours gate to sensitive statuses, and
//! hands the result to every registered [`NotificationSink`]. Scheduling repeated
//! cycles is the caller's job; the tracker never runs two cycles on its own.

pub mod clock;
pub mod domain;
pub mod engine;
pub mod sink;
pub mod source;
pub mod store;
pub mod window;

#[cfg(test)]
mod tests;

pub use clock::{Clock, SystemClock};
pub use domain::{ApplicantIdentity, StatusHistory, StatusQueryResult, StatusRecord};
pub use engine::{
    CycleOutcome, CycleReport, NotificationPolicy, SinkFailure, StatusTracker, TrackerSettings,
    TrackingError, DEFAULT_SENSITIVE_STATUS,
};
pub use sink::{NotificationSink, SinkError};
pub use source::{CaptchaError, CaptchaSolver, SourceError, StatusSource};
pub use store::{JsonFileStore, StatusStore, StoreError};
pub use window::{
    ActiveHoursPolicy, ActiveWindow, TimezoneError, WindowError, WindowZone,
    DEFAULT_ACTIVE_HOURS,
};
