use crate::api::envelope::ApiErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Poll not found (404)")]
    PollNotFound,
    #[error("HTTP {status} {reason}")]
    Http { status: u16, reason: String },
    #[error("{code}: {message}")]
    Api { code: ApiErrorCode, message: String },
    #[error("Invalid API response (shape)")]
    InvalidEnvelope,
    #[error("Invalid poll (shape)")]
    InvalidPoll,
    #[error("Invalid poll list (shape)")]
    InvalidPollList,
    #[error("Request failed: {0}")]
    Request(String),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Invalid channel URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Connection closed")]
    Closed,
    #[error("No async runtime available to drive the socket")]
    NoRuntime,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL in {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },
}

impl From<reqwest::Error> for LoadError {
    fn from(error: reqwest::Error) -> Self {
        LoadError::Request(error.to_string())
    }
}
