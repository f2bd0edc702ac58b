//! In-memory assistant service for testing
//!
//! Hands out sequential ids, keeps an account-wide listing of assistants,
//! files and vector stores, replays scripted run statuses, and can be told to
//! fail a named operation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::{
    ApiResult, Assistant, AssistantApi, AssistantRequest, FileObject, FileUpload, Message,
    MessageContent, MessageQuery, MessageRequest, Model, Page, Run, RunRequest, RunStatus, Thread,
    VectorStore, VectorStoreRequest,
};
use crate::error::ApiError;
use crate::pagination::ResourceKind;

#[derive(Default)]
struct MockState {
    counters: HashMap<&'static str, usize>,
    calls: Vec<(&'static str, Option<String>)>,
    assistants: Vec<String>,
    files: Vec<String>,
    vector_stores: Vec<String>,
    uploads: Vec<FileUpload>,
    vector_store_requests: Vec<VectorStoreRequest>,
    assistant_requests: Vec<AssistantRequest>,
    messages: Vec<MessageRequest>,
    runs: Vec<RunRequest>,
    run_status_index: usize,
}

impl MockState {
    fn next_id(&mut self, prefix: &'static str) -> String {
        let counter = self.counters.entry(prefix).or_insert(0);
        *counter += 1;
        format!("{}_{}", prefix, counter)
    }

    fn listing(&mut self, kind: ResourceKind) -> &mut Vec<String> {
        match kind {
            ResourceKind::Assistant => &mut self.assistants,
            ResourceKind::File => &mut self.files,
            ResourceKind::VectorStore => &mut self.vector_stores,
        }
    }
}

/// A mock assistant service
pub struct MockAssistantApi {
    state: Mutex<MockState>,
    run_statuses: Vec<RunStatus>,
    reply: Option<String>,
    page_size: usize,
    failures: HashMap<&'static str, ApiError>,
}

impl Default for MockAssistantApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAssistantApi {
    /// A service whose runs complete immediately and whose threads have no reply
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            run_statuses: vec![RunStatus::Completed],
            reply: None,
            page_size: 20,
            failures: HashMap::new(),
        }
    }

    /// Statuses reported by `create_run` and then each `retrieve_run`; the last one repeats
    pub fn with_run_statuses(mut self, statuses: Vec<RunStatus>) -> Self {
        if !statuses.is_empty() {
            self.run_statuses = statuses;
        }
        self
    }

    /// Text of the latest message in every thread
    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_string());
        self
    }

    /// Maximum items per list page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Resources that already exist on the account
    pub fn with_existing(self, kind: ResourceKind, ids: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .listing(kind)
            .extend(ids.iter().map(|id| id.to_string()));
        self
    }

    /// Make every call to `operation` (a trait method name) fail with `error`
    pub fn fail_on(mut self, operation: &'static str, error: ApiError) -> Self {
        self.failures.insert(operation, error);
        self
    }

    /// Number of calls made to `operation`
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(name, _)| *name == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Names of all calls, in order
    pub fn call_log(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(name, _)| *name)
            .collect()
    }

    /// Ids passed to `operation`, in call order
    pub fn deleted_ids(&self, operation: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(name, _)| *name == operation)
            .filter_map(|(_, id)| id.clone())
            .collect()
    }

    /// Ids still present on the account
    pub fn remaining(&self, kind: ResourceKind) -> Vec<String> {
        self.state.lock().unwrap().listing(kind).clone()
    }

    pub fn uploaded_files(&self) -> Vec<FileUpload> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn created_vector_stores(&self) -> Vec<VectorStoreRequest> {
        self.state.lock().unwrap().vector_store_requests.clone()
    }

    pub fn created_assistants(&self) -> Vec<AssistantRequest> {
        self.state.lock().unwrap().assistant_requests.clone()
    }

    pub fn posted_messages(&self) -> Vec<MessageRequest> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn started_runs(&self) -> Vec<RunRequest> {
        self.state.lock().unwrap().runs.clone()
    }

    /// Log the call and fail it if it was scripted to fail
    fn record(&self, operation: &'static str, arg: Option<&str>) -> ApiResult<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push((operation, arg.map(str::to_string)));

        match self.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn create(&self, kind: ResourceKind, prefix: &'static str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id(prefix);
        state.listing(kind).push(id.clone());
        id
    }

    fn delete(&self, kind: ResourceKind, id: &str) {
        self.state.lock().unwrap().listing(kind).retain(|x| x != id);
    }

    fn page(&self, kind: ResourceKind, after: Option<&str>) -> Page<String> {
        let mut state = self.state.lock().unwrap();
        let listing = state.listing(kind);

        let start = match after {
            None => 0,
            Some(cursor) => match listing.iter().position(|id| id == cursor) {
                Some(pos) => pos + 1,
                None => return Page::new(Vec::new(), false),
            },
        };

        let data: Vec<String> = listing
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        let has_more = start + data.len() < listing.len();
        Page::new(data, has_more)
    }

    fn next_run_status(&self) -> RunStatus {
        let mut state = self.state.lock().unwrap();
        let index = state.run_status_index.min(self.run_statuses.len() - 1);
        state.run_status_index += 1;
        self.run_statuses[index]
    }
}

#[async_trait]
impl AssistantApi for MockAssistantApi {
    async fn list_models(&self) -> ApiResult<Vec<Model>> {
        self.record("list_models", None)?;
        Ok(vec![Model {
            id: "gpt-3.5-turbo-0125".to_string(),
        }])
    }

    async fn create_file(&self, upload: FileUpload) -> ApiResult<FileObject> {
        self.record("create_file", Some(upload.file_name.as_str()))?;
        let id = self.create(ResourceKind::File, "file");
        let filename = Some(upload.file_name.clone());
        self.state.lock().unwrap().uploads.push(upload);
        Ok(FileObject { id, filename })
    }

    async fn delete_file(&self, file_id: &str) -> ApiResult<()> {
        self.record("delete_file", Some(file_id))?;
        self.delete(ResourceKind::File, file_id);
        Ok(())
    }

    async fn list_files(&self, after: Option<&str>) -> ApiResult<Page<FileObject>> {
        self.record("list_files", after)?;
        let page = self.page(ResourceKind::File, after);
        Ok(Page::new(
            page.data
                .into_iter()
                .map(|id| FileObject { id, filename: None })
                .collect(),
            page.has_more,
        ))
    }

    async fn create_vector_store(&self, request: &VectorStoreRequest) -> ApiResult<VectorStore> {
        self.record("create_vector_store", None)?;
        let id = self.create(ResourceKind::VectorStore, "vs");
        self.state
            .lock()
            .unwrap()
            .vector_store_requests
            .push(request.clone());
        Ok(VectorStore {
            id,
            name: Some(request.name.clone()),
        })
    }

    async fn delete_vector_store(&self, vector_store_id: &str) -> ApiResult<()> {
        self.record("delete_vector_store", Some(vector_store_id))?;
        self.delete(ResourceKind::VectorStore, vector_store_id);
        Ok(())
    }

    async fn list_vector_stores(&self, after: Option<&str>) -> ApiResult<Page<VectorStore>> {
        self.record("list_vector_stores", after)?;
        let page = self.page(ResourceKind::VectorStore, after);
        Ok(Page::new(
            page.data
                .into_iter()
                .map(|id| VectorStore { id, name: None })
                .collect(),
            page.has_more,
        ))
    }

    async fn create_assistant(&self, request: &AssistantRequest) -> ApiResult<Assistant> {
        self.record("create_assistant", None)?;
        let id = self.create(ResourceKind::Assistant, "asst");
        self.state
            .lock()
            .unwrap()
            .assistant_requests
            .push(request.clone());
        Ok(Assistant {
            id,
            name: Some(request.name.clone()),
        })
    }

    async fn delete_assistant(&self, assistant_id: &str) -> ApiResult<()> {
        self.record("delete_assistant", Some(assistant_id))?;
        self.delete(ResourceKind::Assistant, assistant_id);
        Ok(())
    }

    async fn list_assistants(&self, after: Option<&str>) -> ApiResult<Page<Assistant>> {
        self.record("list_assistants", after)?;
        let page = self.page(ResourceKind::Assistant, after);
        Ok(Page::new(
            page.data
                .into_iter()
                .map(|id| Assistant { id, name: None })
                .collect(),
            page.has_more,
        ))
    }

    async fn create_thread(&self) -> ApiResult<Thread> {
        self.record("create_thread", None)?;
        let id = self.state.lock().unwrap().next_id("thread");
        Ok(Thread { id })
    }

    async fn delete_thread(&self, thread_id: &str) -> ApiResult<()> {
        self.record("delete_thread", Some(thread_id))
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: &MessageRequest,
    ) -> ApiResult<Message> {
        self.record("create_message", Some(thread_id))?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("msg");
        state.messages.push(request.clone());
        Ok(Message {
            id,
            role: request.role.clone(),
            content: vec![MessageContent::text(request.content.clone())],
        })
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        query: MessageQuery,
    ) -> ApiResult<Page<Message>> {
        self.record("list_messages", Some(thread_id))?;
        let data = match (&self.reply, query.limit) {
            (Some(reply), limit) if limit > 0 => vec![Message {
                id: "msg_reply".to_string(),
                role: "assistant".to_string(),
                content: vec![MessageContent::text(reply.clone())],
            }],
            _ => Vec::new(),
        };
        Ok(Page::new(data, false))
    }

    async fn create_run(&self, thread_id: &str, request: &RunRequest) -> ApiResult<Run> {
        self.record("create_run", Some(thread_id))?;
        let id = {
            let mut state = self.state.lock().unwrap();
            state.runs.push(request.clone());
            state.next_id("run")
        };
        Ok(Run {
            id,
            thread_id: thread_id.to_string(),
            status: self.next_run_status(),
        })
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> ApiResult<Run> {
        self.record("retrieve_run", Some(run_id))?;
        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            status: self.next_run_status(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
