//! OpenAI Assistants API (v2) over HTTP

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::api::{
    ApiResult, Assistant, AssistantApi, AssistantRequest, FileObject, FileUpload, Message,
    MessageQuery, MessageRequest, Model, Page, Run, RunRequest, Thread, VectorStore,
    VectorStoreRequest,
};
use crate::error::ApiError;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the hosted OpenAI service
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<Model>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, OPENAI_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.post(self.url(path)))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.delete(self.url(path)))
    }

    async fn send(builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ApiError::RateLimited { retry_after });
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&error_text) {
            Ok(error_response) => error_response.error.message,
            Err(_) => error_text,
        };

        Err(ApiError::Status {
            status_code: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> ApiResult<T> {
        Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn list<T: DeserializeOwned>(&self, path: &str, after: Option<&str>) -> ApiResult<Page<T>> {
        let mut builder = self.get(path);
        if let Some(after) = after {
            builder = builder.query(&[("after", after)]);
        }
        Self::send_json(builder).await
    }
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn list_models(&self) -> ApiResult<Vec<Model>> {
        let models: ModelList = Self::send_json(self.get("models")).await?;
        Ok(models.data)
    }

    async fn create_file(&self, upload: FileUpload) -> ApiResult<FileObject> {
        let part = Part::bytes(upload.bytes).file_name(upload.file_name);
        let form = Form::new()
            .text("purpose", upload.purpose)
            .part("file", part);
        Self::send_json(self.post("files").multipart(form)).await
    }

    async fn delete_file(&self, file_id: &str) -> ApiResult<()> {
        Self::send(self.delete(&format!("files/{}", file_id))).await?;
        Ok(())
    }

    async fn list_files(&self, after: Option<&str>) -> ApiResult<Page<FileObject>> {
        self.list("files", after).await
    }

    async fn create_vector_store(&self, request: &VectorStoreRequest) -> ApiResult<VectorStore> {
        Self::send_json(self.post("vector_stores").json(request)).await
    }

    async fn delete_vector_store(&self, vector_store_id: &str) -> ApiResult<()> {
        Self::send(self.delete(&format!("vector_stores/{}", vector_store_id))).await?;
        Ok(())
    }

    async fn list_vector_stores(&self, after: Option<&str>) -> ApiResult<Page<VectorStore>> {
        self.list("vector_stores", after).await
    }

    async fn create_assistant(&self, request: &AssistantRequest) -> ApiResult<Assistant> {
        Self::send_json(self.post("assistants").json(request)).await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> ApiResult<()> {
        Self::send(self.delete(&format!("assistants/{}", assistant_id))).await?;
        Ok(())
    }

    async fn list_assistants(&self, after: Option<&str>) -> ApiResult<Page<Assistant>> {
        self.list("assistants", after).await
    }

    async fn create_thread(&self) -> ApiResult<Thread> {
        Self::send_json(self.post("threads").json(&serde_json::json!({}))).await
    }

    async fn delete_thread(&self, thread_id: &str) -> ApiResult<()> {
        Self::send(self.delete(&format!("threads/{}", thread_id))).await?;
        Ok(())
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: &MessageRequest,
    ) -> ApiResult<Message> {
        let path = format!("threads/{}/messages", thread_id);
        Self::send_json(self.post(&path).json(request)).await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        query: MessageQuery,
    ) -> ApiResult<Page<Message>> {
        let path = format!("threads/{}/messages", thread_id);
        let builder = self.get(&path).query(&[
            ("limit", query.limit.to_string()),
            ("order", "desc".to_string()),
        ]);
        Self::send_json(builder).await
    }

    async fn create_run(&self, thread_id: &str, request: &RunRequest) -> ApiResult<Run> {
        let path = format!("threads/{}/runs", thread_id);
        Self::send_json(self.post(&path).json(request)).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> ApiResult<Run> {
        let path = format!("threads/{}/runs/{}", thread_id, run_id);
        Self::send_json(self.get(&path)).await
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAiClient::with_base_url("sk-test", "http://localhost:8080/v1/");
        assert_eq!(client.url("models"), "http://localhost:8080/v1/models");
    }

    #[test]
    fn test_default_base_url() {
        let client = OpenAiClient::new("sk-test");
        assert_eq!(
            client.url("threads/t/runs"),
            "https://api.openai.com/v1/threads/t/runs"
        );
    }

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "Incorrect API key provided");
    }

    #[test]
    fn test_page_parsing() {
        let body = r#"{"object":"list","data":[{"id":"vs_1","name":"ihaveaplan"},{"id":"vs_2","name":null}],"first_id":"vs_1","last_id":"vs_2","has_more":true}"#;
        let page: Page<VectorStore> = serde_json::from_str(body).unwrap();
        assert_eq!(page.data.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.data[1].name, None);
    }
}
