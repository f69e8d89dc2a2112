use domain::{protocol::ProtocolError, MalformedThreadError, ParamError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected thread listing: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("no readable content at {url}")]
    NoContent { url: String },
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Network and server-side failures may clear up on their own; bad payloads do not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Protocol(_) | Self::NoContent { .. } | Self::Exhausted { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model returned no content")]
    EmptyReply,
    #[error("model reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model reply lacks `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid request: {0}")]
    InvalidParams(#[from] ParamError),
    #[error("thread unavailable: {0}")]
    ThreadUnavailable(#[source] FetchError),
    #[error(transparent)]
    Malformed(#[from] MalformedThreadError),
    #[error("summarization failed: {0}")]
    Llm(#[from] LlmError),
    #[error("cache storage failed: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("could not encode analytics report: {0}")]
    Report(#[from] serde_json::Error),
    #[error("analysis task failed: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub(crate) fn storage(e: anyhow::Error) -> Self {
        Self::Storage(e.into())
    }
}
