use std::time::Duration;

/// Errors raised while obtaining page content.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} timed out: {message}")]
    Timeout { url: String, message: String },

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl FetchError {
    /// Timeouts and connection failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::Connect { .. })
    }
}

/// Errors from the WebDriver rendering capability.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("webdriver unavailable at {endpoint}: {message}")]
    Unavailable { endpoint: String, message: String },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("page did not become ready within {0:?}")]
    NotReady(Duration),

    #[error("webdriver command failed: {0}")]
    Command(String),
}

impl From<fantoccini::error::CmdError> for RenderError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        RenderError::Command(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("extraction exceeded the {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl From<RenderError> for ExtractError {
    fn from(err: RenderError) -> Self {
        ExtractError::Fetch(FetchError::Render(err))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact `{0}` not found")]
    NotFound(String),

    #[error("invalid artifact name `{0}`")]
    InvalidName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("zip archive failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}
