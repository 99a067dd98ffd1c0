use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {message}")]
    Parse { message: String },

    #[error("Fetch timed out after {timeout_ms}ms: {url}")]
    FetchTimeout { url: String, timeout_ms: u64 },

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Page structure not recognised for {url}: {message}")]
    ParseAmbiguous { url: String, message: String },

    #[error("Delivery failed with status {status}: {body}")]
    Delivery { status: u16, body: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Timeouts are the only fetch failure worth retrying.
    pub fn is_timeout(&self) -> bool {
        match self {
            AppError::FetchTimeout { .. } => true,
            AppError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
