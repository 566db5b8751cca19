use reqwest::StatusCode;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("{service} API returned status {status}: {body}")]
    UpstreamStatus {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a fresh attempt of the same call could succeed.
    ///
    /// Timeouts, dropped connections, rate limiting and server-side failures
    /// are transient; everything else fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            AppError::UpstreamStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
