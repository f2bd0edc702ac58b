use std::fmt;

use thiserror::Error;

/// Errors raised by the remote assistant service itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Rate limit exceeded{}", .retry_after.map(|s| format!(". Retry after {} seconds", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("API error (HTTP {status_code}): {message}")]
    Status { status_code: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

/// A prerequisite that must be recorded in the session before an operation can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    ApiKey,
    File,
    VectorStore,
    Assistant,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            Self::ApiKey => "No API key configured",
            Self::File => "No file uploaded",
            Self::VectorStore => "No vector store created",
            Self::Assistant => "No assistant created",
        };
        f.write_str(what)
    }
}

/// The remote step that failed, carried by [`PlanError::RemoteOperationFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    UploadFile,
    CreateVectorStore,
    CreateAssistant,
    CreateThread,
    CreateMessage,
    CreateRun,
    RetrieveRun,
    ListMessages,
    DeleteThread,
    ClearSession,
    ClearEverything,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            Self::UploadFile => "uploading file",
            Self::CreateVectorStore => "creating vector store",
            Self::CreateAssistant => "creating assistant",
            Self::CreateThread => "creating thread",
            Self::CreateMessage => "posting message",
            Self::CreateRun => "starting run",
            Self::RetrieveRun => "retrieving run",
            Self::ListMessages => "listing messages",
            Self::DeleteThread => "deleting thread",
            Self::ClearSession => "clearing",
            Self::ClearEverything => "clearing everything",
        };
        f.write_str(what)
    }
}

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid API Key")]
    InvalidCredential {
        #[source]
        source: ApiError,
    },

    #[error("{0}")]
    MissingPrerequisite(Prerequisite),

    #[error("Error {operation}")]
    RemoteOperationFailed {
        operation: Operation,
        #[source]
        source: ApiError,
    },

    #[error("Error extracting chapters: No data returned")]
    NoDataReturned,

    #[error("Run still pending after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl PlanError {
    pub(crate) fn remote(operation: Operation) -> impl FnOnce(ApiError) -> Self {
        move |source| Self::RemoteOperationFailed { operation, source }
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
