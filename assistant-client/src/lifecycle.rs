//! Creating and tearing down the remote resources behind a plan.
//!
//! Every operation stops at the first failed remote call and leaves whatever
//! it already did in place. Nothing is rolled back.

use log::info;

use crate::api::{AssistantApi, FileUpload};
use crate::config::AssistantConfig;
use crate::error::{Operation, PlanError, Prerequisite, Result};
use crate::pagination::{ResourceKind, drain_listing};
use crate::session::SessionState;

/// Upload a document and index it in a fresh vector store.
///
/// The file id is recorded as soon as the upload succeeds, so a failed index
/// creation leaves a file id with no vector store id.
pub async fn upload_document<A: AssistantApi + ?Sized>(
    api: &A,
    config: &AssistantConfig,
    session: &mut SessionState,
    upload: FileUpload,
) -> Result<()> {
    let size = upload.bytes.len();
    let file = api
        .create_file(upload)
        .await
        .map_err(PlanError::remote(Operation::UploadFile))?;
    info!("Uploaded file {} ({} bytes)", file.id, size);
    session.file_id = Some(file.id.clone());

    let store = api
        .create_vector_store(&config.vector_store_request(&file.id))
        .await
        .map_err(PlanError::remote(Operation::CreateVectorStore))?;
    info!("Created vector store {}", store.id);
    session.vector_store_id = Some(store.id);

    Ok(())
}

/// Create the assistant with file search over the session's vector store.
pub async fn create_assistant<A: AssistantApi + ?Sized>(
    api: &A,
    config: &AssistantConfig,
    session: &mut SessionState,
) -> Result<()> {
    if session.file_id.is_none() {
        return Err(PlanError::MissingPrerequisite(Prerequisite::File));
    }
    let vector_store_id = session
        .vector_store_id
        .as_deref()
        .ok_or(PlanError::MissingPrerequisite(Prerequisite::VectorStore))?;

    let assistant = api
        .create_assistant(&config.assistant_request(vector_store_id))
        .await
        .map_err(PlanError::remote(Operation::CreateAssistant))?;
    info!("Created assistant {}", assistant.id);
    session.assistant_id = Some(assistant.id);

    Ok(())
}

/// Delete the resources tracked by the session, then forget all four ids.
///
/// Untracked resources are skipped. On the first failed deletion the session
/// is left untouched.
pub async fn clear_session<A: AssistantApi + ?Sized>(
    api: &A,
    session: &mut SessionState,
) -> Result<()> {
    if let Some(id) = &session.thread_id {
        api.delete_thread(id)
            .await
            .map_err(PlanError::remote(Operation::ClearSession))?;
        info!("Deleted thread {}", id);
    }
    if let Some(id) = &session.assistant_id {
        api.delete_assistant(id)
            .await
            .map_err(PlanError::remote(Operation::ClearSession))?;
        info!("Deleted assistant {}", id);
    }
    if let Some(id) = &session.vector_store_id {
        api.delete_vector_store(id)
            .await
            .map_err(PlanError::remote(Operation::ClearSession))?;
        info!("Deleted vector store {}", id);
    }
    if let Some(id) = &session.file_id {
        api.delete_file(id)
            .await
            .map_err(PlanError::remote(Operation::ClearSession))?;
        info!("Deleted file {}", id);
    }

    session.clear_resources();
    Ok(())
}

/// What an account-wide sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub assistants: usize,
    pub files: usize,
    pub vector_stores: usize,
    pub thread: bool,
}

/// Delete every assistant, file and vector store the credential can see,
/// plus the session's thread.
///
/// This is not limited to resources this client created. Vector stores are
/// drained page by page, holding back each page's last entry until the next
/// page has been fetched.
pub async fn clear_everything<A: AssistantApi + ?Sized>(
    api: &A,
    session: &mut SessionState,
) -> Result<ClearReport> {
    let remote = || PlanError::remote(Operation::ClearEverything);
    let mut report = ClearReport::default();

    report.assistants = drain_listing(api, ResourceKind::Assistant)
        .await
        .map_err(remote())?;
    report.files = drain_listing(api, ResourceKind::File)
        .await
        .map_err(remote())?;

    if let Some(id) = session.thread_id.take() {
        if let Err(e) = api.delete_thread(&id).await {
            session.thread_id = Some(id);
            return Err(remote()(e));
        }
        info!("Deleted thread {}", id);
        report.thread = true;
    }

    report.vector_stores = drain_listing(api, ResourceKind::VectorStore)
        .await
        .map_err(remote())?;

    session.clear_resources();
    info!(
        "Cleared {} assistant(s), {} file(s), {} vector store(s)",
        report.assistants, report.files, report.vector_stores
    );
    Ok(report)
}
