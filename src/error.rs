use std::fmt;

use thiserror::Error;

/// Errors surfaced by the generation client and the publishing integrations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported model \"{0}\"")]
    UnsupportedModel(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("insufficient points: {0}")]
    InsufficientPoints(String),

    #[error("request failed (ret {code}): {message}")]
    RequestFailed { code: i64, message: String },

    #[error("content filtered by the remote service (fail code {0})")]
    ContentFiltered(String),

    #[error("image generation failed: {0}")]
    GenerationFailed(String),

    #[error("gave up waiting for job {history_id} after {attempts} polls")]
    Timeout { history_id: String, attempts: u32 },

    #[error("wait for job {0} was cancelled")]
    Cancelled(String),

    #[error("{service} error {code}: {message}")]
    Remote {
        service: &'static str,
        code: i64,
        message: String,
    },

    #[error("{step} failed: {source}")]
    PublishStep {
        step: PublishStep,
        #[source]
        source: Box<Error>,
    },

    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable code for the error kind, used at the tool boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnsupportedModel(_) => "UNSUPPORTED_MODEL",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::SubmissionFailed(_) => "SUBMISSION_FAILED",
            Error::InsufficientPoints(_) => "INSUFFICIENT_POINTS",
            Error::RequestFailed { .. } => "REQUEST_FAILED",
            Error::ContentFiltered(_) => "CONTENT_FILTERED",
            Error::GenerationFailed(_) => "GENERATION_FAILED",
            Error::Timeout { .. } => "TIMEOUT",
            Error::Cancelled(_) => "CANCELLED",
            Error::Remote { .. } => "REMOTE_ERROR",
            Error::PublishStep { source, .. } => source.kind(),
            Error::HttpStatus { .. } => "HTTP_STATUS",
            Error::Transport(_) => "TRANSPORT",
            Error::Decode(_) => "DECODE",
        }
    }
}

/// Ordered steps of the article publish pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    // Juejin
    CreateDraft,
    UpdateDraft,
    Publish,
    // WeChat official account
    FetchToken,
    UploadCover,
    AddDraft,
    SubmitPublish,
    QueryPublish,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PublishStep::CreateDraft => "create draft",
            PublishStep::UpdateDraft => "update draft",
            PublishStep::Publish => "publish article",
            PublishStep::FetchToken => "fetch access token",
            PublishStep::UploadCover => "upload cover image",
            PublishStep::AddDraft => "add draft",
            PublishStep::SubmitPublish => "submit publish",
            PublishStep::QueryPublish => "query publish status",
        })
    }
}
