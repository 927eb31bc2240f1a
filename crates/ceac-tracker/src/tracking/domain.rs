use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Identifiers the status lookup needs to locate one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantIdentity {
    pub location: String,
    pub case_number: String,
    pub passport_number: String,
    pub surname: String,
}

/// Payload returned by the status lookup.
///
/// Only `status` is inspected by the tracker. Everything else the lookup
/// returned is kept in `details` and forwarded to sinks untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusQueryResult {
    pub status: String,
    pub case_last_updated: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl StatusQueryResult {
    pub fn new(status: impl Into<String>, case_last_updated: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            case_last_updated: case_last_updated.into(),
            details: Map::new(),
        }
    }
}

/// One observed status. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: String,
    #[serde(rename = "date", deserialize_with = "deserialize_observed_at")]
    pub observed_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(status: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            status: status.into(),
            observed_at,
        }
    }
}

/// Append-only, oldest-first sequence of observed statuses.
///
/// Serialized as `{"statuses": [...]}`. A document without the `statuses`
/// key reads back as an empty history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistory {
    #[serde(default)]
    statuses: Vec<StatusRecord>,
}

impl StatusHistory {
    pub fn records(&self) -> &[StatusRecord] {
        &self.statuses
    }

    pub fn last(&self) -> Option<&StatusRecord> {
        self.statuses.last()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn push(&mut self, record: StatusRecord) {
        self.statuses.push(record);
    }

    pub fn into_records(self) -> Vec<StatusRecord> {
        self.statuses
    }
}

impl FromIterator<StatusRecord> for StatusHistory {
    fn from_iter<I: IntoIterator<Item = StatusRecord>>(iter: I) -> Self {
        Self {
            statuses: iter.into_iter().collect(),
        }
    }
}

/// Accepts RFC 3339 timestamps as well as offset-less ISO-8601 ones, which
/// older history files contain; the latter are read as local time.
pub(crate) fn parse_observed_at(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|err| format!("failed to parse '{raw}' as an ISO-8601 timestamp ({err})"))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("'{raw}' does not exist in the local timezone"))
}

fn deserialize_observed_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_observed_at(&raw).map_err(serde::de::Error::custom)
}
