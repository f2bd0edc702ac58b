//! Client for turning a document into a chapter plan with a hosted assistant
//!
//! The flow, in order:
//! - validate an API key ([`validate_api_key`])
//! - upload the document into a vector store ([`upload_document`])
//! - create a file-search assistant over it ([`create_assistant`])
//! - ask for the chapter list and wait for the run ([`extract_chapters`])
//! - tear the resources down again ([`clear_session`], [`clear_everything`])

pub mod api;
pub mod chapters;
pub mod config;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod pagination;
pub mod poller;
pub mod providers;
pub mod session;

pub use api::{AssistantApi, FileUpload, Page, RunStatus};
pub use chapters::{Chapter, parse_chapters};
pub use config::{AssistantConfig, Config, PollConfig};
pub use credentials::validate_api_key;
pub use error::{ApiError, Operation, PlanError, Prerequisite, Result};
pub use lifecycle::{ClearReport, clear_everything, clear_session, create_assistant, upload_document};
pub use pagination::{HoldBackDrain, ResourceKind};
pub use poller::{PollPolicy, RunPhase, extract_chapters, fetch_reply};
pub use providers::{MockAssistantApi, OpenAiClient, get_api};
pub use session::SessionState;
