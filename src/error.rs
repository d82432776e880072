use thiserror::Error;

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum UniError {
    // Bad or missing configuration: unresolvable plugin id, missing
    // parameter, cleaner rejection. Never retried.
    #[error("bad configuration: {0}")]
    Configuration(String),

    // Unrecoverable run-time condition raised explicitly, e.g. a
    // malformed persisted model file.
    #[error("fatal: {0}")]
    Fatal(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl UniError {
    /// Process exit code for this error: 2 for configuration problems,
    /// 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            UniError::Configuration(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for UniError
pub type Result<T> = std::result::Result<T, UniError>;
