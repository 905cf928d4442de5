use thiserror::Error;

/// Ways a refresh can fail. The manager turns each of these into a failed
/// status carrying the `Display` text; none of them escape a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("invalid URL")]
    InvalidUrl,

    #[error("network error: {0}")]
    Network(String),

    #[error("decode error")]
    Decode,
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
