//! Client construction errors.
//!
//! Request failures are not errors; they are [`FetchOutcome`](crate::FetchOutcome)
//! values and degrade to missing data.

/// Errors raised while setting up a [`ThingsboardClient`](crate::ThingsboardClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The backend base URL is malformed or not http(s).
    #[error("Invalid backend URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The bearer token cannot be sent as a header value.
    #[error("Invalid backend token: {0}")]
    InvalidToken(String),

    /// The underlying HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

impl ClientError {
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
