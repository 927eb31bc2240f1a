use super::domain::{ApplicantIdentity, StatusQueryResult};

/// Turns a captcha image into the token the status lookup expects.
pub trait CaptchaSolver: Send + Sync {
    fn solve(&self, image: &[u8]) -> Result<String, CaptchaError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    #[error("captcha solver unavailable: {0}")]
    Unavailable(String),
    #[error("captcha could not be solved: {0}")]
    Unsolved(String),
}

/// The government status lookup. Retries and timeouts are the implementor's
/// concern; the tracker treats any error as "status unknown this cycle".
pub trait StatusSource: Send + Sync {
    fn query(
        &self,
        applicant: &ApplicantIdentity,
        solver: &dyn CaptchaSolver,
    ) -> Result<StatusQueryResult, SourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Captcha(#[from] CaptchaError),
    #[error("status lookup transport failed: {0}")]
    Transport(String),
    #[error("unexpected status lookup response: {0}")]
    Response(String),
}
