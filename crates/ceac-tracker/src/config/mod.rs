use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::telemetry::LogFormat;
use crate::tracking::{
    ActiveHoursPolicy, ActiveWindow, ApplicantIdentity, NotificationPolicy, TrackerSettings,
    WindowError, WindowZone, DEFAULT_ACTIVE_HOURS, DEFAULT_SENSITIVE_STATUS,
};

const DEFAULT_STATUS_FILE: &str = "status_record.json";

/// Top-level configuration for the tracker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tracking: TrackingConfig,
    pub applicant: ApplicantConfig,
    pub adapters: AdapterConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Read `.env` (if present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_hours = env::var("ACTIVE_HOURS").unwrap_or_else(|_| DEFAULT_ACTIVE_HOURS.to_string());
        let active_hours = ActiveWindow::parse(&raw_hours).map_err(ConfigError::InvalidActiveHours)?;

        let policy = match non_empty_var("NOTIFY_POLICY") {
            Some(raw) => raw
                .parse::<NotificationPolicy>()
                .map_err(ConfigError::InvalidPolicy)?,
            None => NotificationPolicy::default(),
        };

        let sensitive_statuses = match non_empty_var("SENSITIVE_STATUSES") {
            Some(raw) => split_list(&raw, ','),
            None => vec![DEFAULT_SENSITIVE_STATUS.to_string()],
        };

        let status_file = non_empty_var("STATUS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATUS_FILE));

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match non_empty_var("APP_LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>().map_err(ConfigError::InvalidLogFormat)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            tracking: TrackingConfig {
                active_hours,
                timezone: non_empty_var("TIMEZONE"),
                sensitive_statuses,
                policy,
                status_file,
            },
            applicant: ApplicantConfig {
                location: non_empty_var("LOCATION"),
                case_number: non_empty_var("NUMBER"),
                passport_number: non_empty_var("PASSPORT_NUMBER"),
                surname: non_empty_var("SURNAME"),
            },
            adapters: AdapterConfig {
                status_command: non_empty_var("STATUS_COMMAND"),
                captcha_command: non_empty_var("CAPTCHA_COMMAND"),
                notify_commands: non_empty_var("NOTIFY_COMMANDS")
                    .map(|raw| split_list(&raw, ';'))
                    .unwrap_or_default(),
            },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
        })
    }
}

/// Status gating and persistence settings.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub active_hours: ActiveWindow,
    pub timezone: Option<String>,
    pub sensitive_statuses: Vec<String>,
    pub policy: NotificationPolicy,
    pub status_file: PathBuf,
}

impl TrackingConfig {
    /// Resolves the timezone, so call it after telemetry is up: a bad
    /// `TIMEZONE` is reported through the log, not as an error.
    pub fn active_hours_policy(&self) -> ActiveHoursPolicy {
        ActiveHoursPolicy::new(
            self.active_hours,
            WindowZone::resolve(self.timezone.as_deref()),
        )
    }

    pub fn settings(&self) -> TrackerSettings {
        TrackerSettings {
            active_hours: self.active_hours_policy(),
            sensitive_statuses: self.sensitive_statuses.clone(),
            policy: self.policy,
        }
    }
}

/// Applicant identifiers. Only commands that query the lookup need them.
#[derive(Debug, Clone, Default)]
pub struct ApplicantConfig {
    pub location: Option<String>,
    pub case_number: Option<String>,
    pub passport_number: Option<String>,
    pub surname: Option<String>,
}

impl ApplicantConfig {
    pub fn identity(&self) -> Result<ApplicantIdentity, ConfigError> {
        Ok(ApplicantIdentity {
            location: required(&self.location, "LOCATION")?,
            case_number: required(&self.case_number, "NUMBER")?,
            passport_number: required(&self.passport_number, "PASSPORT_NUMBER")?,
            surname: required(&self.surname, "SURNAME")?,
        })
    }
}

/// External programs backing the lookup, captcha, and notification adapters.
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    pub status_command: Option<String>,
    pub captcha_command: Option<String>,
    pub notify_commands: Vec<String>,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidActiveHours(WindowError),
    InvalidPolicy(String),
    InvalidLogFormat(String),
    MissingVariable(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidActiveHours(err) => write!(f, "ACTIVE_HOURS is invalid: {err}"),
            ConfigError::InvalidPolicy(reason) => write!(f, "NOTIFY_POLICY is invalid: {reason}"),
            ConfigError::InvalidLogFormat(reason) => write!(f, "APP_LOG_FORMAT is invalid: {reason}"),
            ConfigError::MissingVariable(key) => write!(f, "{key} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidActiveHours(err) => Some(err),
            ConfigError::InvalidPolicy(_)
            | ConfigError::InvalidLogFormat(_)
            | ConfigError::MissingVariable(_) => None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn required(value: &Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value.clone().ok_or(ConfigError::MissingVariable(key))
}
