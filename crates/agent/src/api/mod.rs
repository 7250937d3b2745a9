//! Seam to the hosted assistants service.
//!
//! `AssistantsApi` covers the assistants, files, threads, messages and runs
//! operations the agent needs. `AzureAssistantsClient` is the reqwest-backed
//! implementation; tests substitute in-memory fakes.

pub mod azure;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use azure::AzureAssistantsClient;
pub use types::{
    Assistant, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest, DeletionStatus,
    FileObject, Message, MessageContent, MessageRole, Run, RunStatus, Thread, ToolCall, ToolOutput,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("assistants request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("assistants service returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait AssistantsApi: Send + Sync {
    async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<Assistant, ApiError>;
    async fn list_assistants(&self) -> Result<Vec<Assistant>, ApiError>;
    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus, ApiError>;

    /// Uploads `bytes` with purpose `assistants`.
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileObject, ApiError>;
    async fn delete_file(&self, file_id: &str) -> Result<DeletionStatus, ApiError>;
    async fn file_content(&self, file_id: &str) -> Result<Vec<u8>, ApiError>;

    async fn create_thread(&self) -> Result<Thread, ApiError>;
    async fn delete_thread(&self, thread_id: &str) -> Result<DeletionStatus, ApiError>;

    async fn create_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> Result<Message, ApiError>;
    /// Messages in ascending creation order, optionally only those after `after`.
    async fn list_messages(
        &self,
        thread_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<Message>, ApiError>;

    async fn create_run(&self, thread_id: &str, request: &CreateRunRequest)
        -> Result<Run, ApiError>;
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError>;
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> Result<Run, ApiError>;
}
