//! Active hours: the daily window in which sensitive statuses may be sent.
//!
//! A window is a pair of wall-clock times on the same day. Windows that wrap
//! past midnight (`22:00-06:00`) are rejected rather than reinterpreted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

pub const DEFAULT_ACTIVE_HOURS: &str = "00:00-23:59";

const TIME_OF_DAY_FORMAT: &str = "%H:%M";

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("active hours '{0}' must look like HH:MM-HH:MM")]
    Malformed(String),
    #[error("invalid time of day '{value}' in active hours: {source}")]
    InvalidTime {
        value: String,
        source: chrono::ParseError,
    },
    #[error(
        "start time must be before end time, got start: {start}, end: {end} \
         (windows spanning midnight are not supported)"
    )]
    StartAfterEnd { start: String, end: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl ActiveWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::StartAfterEnd {
                start: start.format(TIME_OF_DAY_FORMAT).to_string(),
                end: end.format(TIME_OF_DAY_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse `HH:MM-HH:MM` in the 24-hour clock.
    pub fn parse(raw: &str) -> Result<Self, WindowError> {
        let (start, end) = raw
            .trim()
            .split_once('-')
            .ok_or_else(|| WindowError::Malformed(raw.to_string()))?;
        Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Inclusive on both bounds.
    pub fn contains_time(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }

    /// Builds the window's bounds on `now`'s calendar date in `now`'s zone and
    /// tests `start <= now <= end`.
    ///
    /// When a bound lands in a DST gap it has no zoned counterpart; the check
    /// then falls back to comparing wall-clock time of day.
    pub fn contains<Z: TimeZone>(&self, now: &DateTime<Z>) -> bool {
        let date = now.date_naive();
        let zone = now.timezone();
        let start = zone.from_local_datetime(&date.and_time(self.start)).earliest();
        let end = zone.from_local_datetime(&date.and_time(self.end)).latest();

        match (start, end) {
            (Some(start), Some(end)) => start <= *now && *now <= end,
            _ => self.contains_time(now.time()),
        }
    }
}

impl FromStr for ActiveWindow {
    type Err = WindowError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for ActiveWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format(TIME_OF_DAY_FORMAT),
            self.end.format(TIME_OF_DAY_FORMAT)
        )
    }
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, WindowError> {
    let value = raw.trim();
    NaiveTime::parse_from_str(value, TIME_OF_DAY_FORMAT).map_err(|source| {
        WindowError::InvalidTime {
            value: value.to_string(),
            source,
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimezoneError {
    #[error("TIMEZONE is not set")]
    Unset,
    #[error("unknown timezone '{0}'")]
    Unknown(String),
}

/// Zone in which the active window is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowZone {
    Named(Tz),
    /// The process's local zone, used when no usable zone was configured.
    Local,
}

impl WindowZone {
    pub fn parse(raw: Option<&str>) -> Result<Tz, TimezoneError> {
        let value = raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(TimezoneError::Unset)?;
        value
            .parse::<Tz>()
            .map_err(|_| TimezoneError::Unknown(value.to_string()))
    }

    /// Resolve a configured zone, degrading to local time instead of failing.
    pub fn resolve(raw: Option<&str>) -> Self {
        match Self::parse(raw) {
            Ok(zone) => Self::Named(zone),
            Err(TimezoneError::Unset) => {
                info!("TIMEZONE not set, evaluating active hours in local time");
                Self::Local
            }
            Err(err) => {
                warn!(error = %err, "timezone resolution failed, evaluating active hours in local time");
                Self::Local
            }
        }
    }
}

impl fmt::Display for WindowZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowZone::Named(zone) => write!(f, "{}", zone.name()),
            WindowZone::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveHoursPolicy {
    window: ActiveWindow,
    zone: WindowZone,
}

impl ActiveHoursPolicy {
    pub fn new(window: ActiveWindow, zone: WindowZone) -> Self {
        Self { window, zone }
    }

    pub fn window(&self) -> ActiveWindow {
        self.window
    }

    pub fn zone(&self) -> WindowZone {
        self.zone
    }

    pub fn permits(&self, instant: DateTime<Utc>) -> bool {
        match self.zone {
            WindowZone::Named(zone) => self.window.contains(&instant.with_timezone(&zone)),
            WindowZone::Local => self.window.contains(&instant.with_timezone(&Local)),
        }
    }
}
