use thiserror::Error;

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Malformed username or date. Raised before any upstream call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required upstream failed or timed out. Aborts the run.
    #[error("{upstream} unavailable: {reason}")]
    UpstreamUnavailable { upstream: &'static str, reason: String },

    /// The best-effort scrape was blocked, empty or unparsable.
    #[error("{upstream} degraded: {reason}")]
    UpstreamDegraded { upstream: &'static str, reason: String },

    /// One repository's auxiliary fetch failed.
    #[error("{item} failed: {reason}")]
    PerItemFailure { item: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl AnalyticsError {
    pub fn unavailable(upstream: &'static str, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            upstream,
            reason: reason.to_string(),
        }
    }

    pub fn degraded(upstream: &'static str, reason: impl ToString) -> Self {
        Self::UpstreamDegraded {
            upstream,
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for AnalyticsError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AnalyticsError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(format!("blocking task failed: {}", err))
    }
}
