#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed with HTTP {status}: {detail}")]
    Api {
        operation: &'static str,
        status: u16,
        detail: String,
    },
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unknown role: {0:?}")]
    InvalidRole(String),
}

impl Error {
    /// HTTP status of a rejected API call, if the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
