//! Dispatch error types.

use edgeplane_control::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("malformed or unsupported asset url: {0}")]
    BadUrl(String),

    #[error("transient failure fetching {url}: {source}")]
    Transient {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("asset host answered {url} with status {status}")]
    Rejected { url: String, status: u16 },

    #[error("asset host is unavailable for {url} (status {status})")]
    Unavailable { url: String, status: u16 },

    #[error("could not stage {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether trying again later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. } | FetchError::Unavailable { .. })
    }

    /// Short cause for audit messages.
    pub fn reason(&self) -> String {
        match self {
            FetchError::Transient { .. } => "transient network failure".to_string(),
            FetchError::Rejected { status, .. } => format!("rejected with HTTP {status}"),
            FetchError::Unavailable { status, .. } => {
                format!("host temporarily unavailable (HTTP {status})")
            }
            FetchError::BadUrl(_) => "malformed url".to_string(),
            FetchError::Io { source, .. } => format!("i/o error: {source}"),
            FetchError::Client(_) => "http client unavailable".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("runner request {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("runner answered {url} with status {status}")]
    Status { url: String, status: u16 },

    #[error("runner did not issue a session cookie")]
    NoSession,

    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<FetchError> for EngineError {
    fn from(e: FetchError) -> Self {
        EngineError::Fetch(e.to_string())
    }
}

impl From<RunnerError> for EngineError {
    fn from(e: RunnerError) -> Self {
        EngineError::Runner(e.to_string())
    }
}
