use std::time::Duration;

use async_trait::async_trait;
use copilot_core::AgentConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    Assistant, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest, DeletionStatus,
    FileObject, ListResponse, Message, Run, SubmitToolOutputsRequest, Thread, ToolOutput,
};
use super::{ApiError, AssistantsApi};

/// Azure OpenAI Assistants REST client.
#[derive(Clone)]
pub struct AzureAssistantsClient {
    http: Client,
    api_root: String,
    api_version: String,
    api_key: SecretString,
}

impl AzureAssistantsClient {
    pub fn new(config: &AgentConfig, request_timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: Client, config: &AgentConfig) -> Self {
        Self {
            http,
            api_root: config.api_root(),
            api_version: config.api_version.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.api_root, path);
        debug!(event_name = "agent.api.request", method = %method, url = %url, "assistants request");
        self.http
            .request(method, url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", self.api_key.expose_secret())
    }

    async fn send_json<T>(builder: RequestBuilder) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = checked(builder).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn checked(builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status: status.as_u16(), body });
    }
    Ok(response)
}

#[async_trait]
impl AssistantsApi for AzureAssistantsClient {
    async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<Assistant, ApiError> {
        Self::send_json(self.request(Method::POST, "assistants").json(request)).await
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, ApiError> {
        let page: ListResponse<Assistant> = Self::send_json(
            self.request(Method::GET, "assistants").query(&[("order", "desc"), ("limit", "100")]),
        )
        .await?;
        Ok(page.data)
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus, ApiError> {
        Self::send_json(self.request(Method::DELETE, &format!("assistants/{assistant_id}"))).await
    }

    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileObject, ApiError> {
        let form = Form::new()
            .text("purpose", "assistants")
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        Self::send_json(self.request(Method::POST, "files").multipart(form)).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<DeletionStatus, ApiError> {
        Self::send_json(self.request(Method::DELETE, &format!("files/{file_id}"))).await
    }

    async fn file_content(&self, file_id: &str) -> Result<Vec<u8>, ApiError> {
        let response =
            checked(self.request(Method::GET, &format!("files/{file_id}/content"))).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn create_thread(&self) -> Result<Thread, ApiError> {
        Self::send_json(self.request(Method::POST, "threads").json(&serde_json::json!({}))).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<DeletionStatus, ApiError> {
        Self::send_json(self.request(Method::DELETE, &format!("threads/{thread_id}"))).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> Result<Message, ApiError> {
        Self::send_json(
            self.request(Method::POST, &format!("threads/{thread_id}/messages")).json(request),
        )
        .await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<Message>, ApiError> {
        let mut builder = self
            .request(Method::GET, &format!("threads/{thread_id}/messages"))
            .query(&[("order", "asc"), ("limit", "100")]);
        if let Some(after) = after {
            builder = builder.query(&[("after", after)]);
        }
        let page: ListResponse<Message> = Self::send_json(builder).await?;
        Ok(page.data)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        request: &CreateRunRequest,
    ) -> Result<Run, ApiError> {
        Self::send_json(
            self.request(Method::POST, &format!("threads/{thread_id}/runs")).json(request),
        )
        .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        Self::send_json(self.request(Method::GET, &format!("threads/{thread_id}/runs/{run_id}")))
            .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> Result<Run, ApiError> {
        let body = SubmitToolOutputsRequest { tool_outputs };
        Self::send_json(
            self.request(
                Method::POST,
                &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            )
            .json(&body),
        )
        .await
    }
}
