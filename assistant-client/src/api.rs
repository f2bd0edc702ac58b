//! The remote assistant service, as seen from this crate.
//!
//! Every remote call the client makes goes through [`AssistantApi`], so the
//! lifecycle, poller and validator can run against the real HTTP client or
//! against the in-memory mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, has_more: bool) -> Self {
        Self { data, has_more }
    }
}

/// A listed account resource: its id and, when the service reports one, its name.
pub trait Identified {
    fn id(&self) -> &str;
    fn display_name(&self) -> Option<&str>;
}

macro_rules! identified {
    ($($ty:ty => $name:ident),* $(,)?) => {
        $(impl Identified for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn display_name(&self) -> Option<&str> {
                self.$name.as_deref()
            }
        })*
    };
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Model {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thread {
    pub id: String,
}

identified!(FileObject => filename, VectorStore => name, Assistant => name);

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextValue {
    pub value: String,
}

/// A content fragment of a thread message. Only text fragments carry anything we read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            text: TextValue {
                value: value.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl Message {
    /// All text fragments, newline-joined.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Binary content to upload for retrieval use.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub purpose: String,
}

impl FileUpload {
    pub fn for_assistants(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            purpose: "assistants".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiresAfter {
    pub anchor: String,
    pub days: u32,
}

impl ExpiresAfter {
    pub fn last_active(days: u32) -> Self {
        Self {
            anchor: "last_active_at".to_string(),
            days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorStoreRequest {
    pub name: String,
    pub file_ids: Vec<String>,
    pub expires_after: ExpiresAfter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSearchResources {
    pub vector_store_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResources {
    pub file_search: FileSearchResources,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantRequest {
    pub model: String,
    pub description: String,
    pub instructions: String,
    pub name: String,
    pub temperature: f32,
    pub tools: Vec<Tool>,
    pub tool_resources: ToolResources,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRequest {
    pub role: String,
    pub content: String,
}

impl MessageRequest {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub assistant_id: String,
    pub instructions: String,
}

/// Messages are always listed newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageQuery {
    pub limit: u32,
}

impl MessageQuery {
    /// Only the newest message.
    pub fn latest() -> Self {
        Self { limit: 1 }
    }
}

/// Trait for the hosted assistant service
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Cheapest authorized call; used to probe a credential
    async fn list_models(&self) -> ApiResult<Vec<Model>>;

    async fn create_file(&self, upload: FileUpload) -> ApiResult<FileObject>;
    async fn delete_file(&self, file_id: &str) -> ApiResult<()>;
    async fn list_files(&self, after: Option<&str>) -> ApiResult<Page<FileObject>>;

    async fn create_vector_store(&self, request: &VectorStoreRequest) -> ApiResult<VectorStore>;
    async fn delete_vector_store(&self, vector_store_id: &str) -> ApiResult<()>;
    async fn list_vector_stores(&self, after: Option<&str>) -> ApiResult<Page<VectorStore>>;

    async fn create_assistant(&self, request: &AssistantRequest) -> ApiResult<Assistant>;
    async fn delete_assistant(&self, assistant_id: &str) -> ApiResult<()>;
    async fn list_assistants(&self, after: Option<&str>) -> ApiResult<Page<Assistant>>;

    async fn create_thread(&self) -> ApiResult<Thread>;
    async fn delete_thread(&self, thread_id: &str) -> ApiResult<()>;

    async fn create_message(&self, thread_id: &str, request: &MessageRequest)
    -> ApiResult<Message>;
    async fn list_messages(&self, thread_id: &str, query: MessageQuery)
    -> ApiResult<Page<Message>>;

    async fn create_run(&self, thread_id: &str, request: &RunRequest) -> ApiResult<Run>;
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> ApiResult<Run>;

    /// Get the service name for display
    fn name(&self) -> &'static str;
}
