use super::domain::StatusQueryResult;

/// Outbound notification channel (e-mail, push, chat adapters).
pub trait NotificationSink: Send + Sync {
    /// Short label used in logs and failure reports.
    fn name(&self) -> &str;

    fn deliver(&self, result: &StatusQueryResult) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}
