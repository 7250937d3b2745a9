use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use copilot_core::errors::require;
use copilot_core::{AgentConfig, ArgumentError, ToolSpec};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::types::{CodeInterpreterResources, ToolResources};
use crate::api::{
    Assistant, AssistantsApi, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest,
    FileObject, Message, RunStatus,
};
use crate::errors::AgentError;
use crate::messages::{render_messages, MessageView};
use crate::resources::{CleanupReport, ResourceHandle, ResourceKind, ResourceTable};
use crate::runs::{drive_run, RunSettings};
use crate::tools::FunctionCallDelegate;

/// Construction parameters for [`AssistantAgent`].
#[derive(Default)]
pub struct AgentOptions {
    pub name: Option<String>,
    pub instructions: Option<String>,
    pub data_folder: Option<PathBuf>,
    pub tool_specs: Option<Vec<ToolSpec>>,
    pub keep_state: bool,
    pub delegate: Option<Arc<dyn FunctionCallDelegate>>,
    pub runs: RunSettings,
}

impl AgentOptions {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        tool_specs: Vec<ToolSpec>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            instructions: Some(instructions.into()),
            tool_specs: Some(tool_specs),
            ..Self::default()
        }
    }

    pub fn with_data_folder(mut self, data_folder: Option<PathBuf>) -> Self {
        self.data_folder = data_folder;
        self
    }

    pub fn with_keep_state(mut self, keep_state: bool) -> Self {
        self.keep_state = keep_state;
        self
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn FunctionCallDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_runs(mut self, runs: RunSettings) -> Self {
        self.runs = runs;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptReply {
    pub correlation_id: String,
    pub thread_id: String,
    pub run_id: String,
    pub messages: Vec<MessageView>,
}

/// Boxed body passed to [`AssistantAgent::scoped`].
pub type ScopedBody<'a, T> = Pin<Box<dyn Future<Output = Result<T, AgentError>> + Send + 'a>>;

/// A remote assistant plus every remote resource created on its behalf.
pub struct AssistantAgent {
    api: Arc<dyn AssistantsApi>,
    model: String,
    name: String,
    instructions: String,
    data_folder: Option<PathBuf>,
    tool_specs: Vec<ToolSpec>,
    keep_state: bool,
    delegate: Option<Arc<dyn FunctionCallDelegate>>,
    runs: RunSettings,
    assistant: Option<Assistant>,
    resources: ResourceTable,
    user_threads: HashMap<String, String>,
    file_ids: Vec<String>,
}

impl AssistantAgent {
    /// Validates `options` and provisions (or reuses) the remote assistant.
    ///
    /// Argument and tool-registry validation happen before any request is made.
    /// If provisioning fails part-way, whatever was already created is deleted
    /// before the error is returned.
    pub async fn new(
        config: &AgentConfig,
        api: Arc<dyn AssistantsApi>,
        options: AgentOptions,
    ) -> Result<Self, AgentError> {
        let name = require(options.name, "name")?;
        let instructions = require(options.instructions, "instructions")?;
        let tool_specs = require(options.tool_specs, "tool_specs")?;
        if let Some(delegate) = &options.delegate {
            delegate.validate(&tool_specs)?;
        }

        let mut agent = Self {
            api,
            model: config.model_deployment.clone(),
            name,
            instructions,
            data_folder: options.data_folder,
            tool_specs,
            keep_state: options.keep_state,
            delegate: options.delegate,
            runs: options.runs,
            assistant: None,
            resources: ResourceTable::default(),
            user_threads: HashMap::new(),
            file_ids: Vec::new(),
        };

        if let Err(error) = agent.provision().await {
            error!(
                event_name = "agent.assistant.provision_failed",
                assistant_name = %agent.name,
                error = %error,
                "assistant provisioning failed; releasing partial resources"
            );
            agent.cleanup().await;
            return Err(error);
        }

        Ok(agent)
    }

    /// Builds an agent, runs `body` with it and always cleans up afterwards.
    ///
    /// The body's error wins over a cleanup failure; a successful body whose
    /// cleanup leaves resources behind yields [`AgentError::CleanupIncomplete`].
    pub async fn scoped<T, F>(
        config: &AgentConfig,
        api: Arc<dyn AssistantsApi>,
        options: AgentOptions,
        body: F,
    ) -> Result<T, AgentError>
    where
        F: for<'a> FnOnce(&'a mut AssistantAgent) -> ScopedBody<'a, T>,
    {
        let mut agent = Self::new(config, api, options).await?;
        let outcome = body(&mut agent).await;
        let report = agent.cleanup().await;

        match outcome {
            Ok(_) if !report.is_clean() => {
                Err(AgentError::CleanupIncomplete(report.failed.len()))
            }
            outcome => outcome,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assistant(&self) -> Option<&Assistant> {
        self.assistant.as_ref()
    }

    pub fn tool_specs(&self) -> &[ToolSpec] {
        &self.tool_specs
    }

    pub fn file_ids(&self) -> &[String] {
        &self.file_ids
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Whether the assistant was created by this agent (and will be deleted by `cleanup`).
    pub fn owns_assistant(&self) -> bool {
        self.assistant.as_ref().is_some_and(|assistant| self.resources.contains(&assistant.id))
    }

    async fn provision(&mut self) -> Result<(), AgentError> {
        if self.keep_state {
            if let Some(existing) = self.find_existing().await? {
                info!(
                    event_name = "agent.assistant.reused",
                    assistant_id = %existing.id,
                    assistant_name = %self.name,
                    "reusing existing remote assistant"
                );
                self.assistant = Some(existing);
                return Ok(());
            }
        }

        if self.data_folder.is_some() {
            self.upload_all_files().await?;
        }

        let tool_resources = (!self.file_ids.is_empty()
            && self.tool_specs.contains(&ToolSpec::CodeInterpreter))
        .then(|| ToolResources {
            code_interpreter: Some(CodeInterpreterResources { file_ids: self.file_ids.clone() }),
        });

        let request = CreateAssistantRequest {
            model: self.model.clone(),
            name: self.name.clone(),
            instructions: self.instructions.clone(),
            tools: self.tool_specs.clone(),
            tool_resources,
        };
        let assistant = self.api.create_assistant(&request).await?;
        self.resources.insert(ResourceKind::Assistant, assistant.id.clone());
        info!(
            event_name = "agent.assistant.created",
            assistant_id = %assistant.id,
            assistant_name = %self.name,
            tools = self.tool_specs.len(),
            files = self.file_ids.len(),
            "remote assistant created"
        );
        self.assistant = Some(assistant);
        Ok(())
    }

    async fn find_existing(&self) -> Result<Option<Assistant>, AgentError> {
        let assistants = self.api.list_assistants().await?;
        Ok(assistants.into_iter().find(|assistant| assistant.name.as_deref() == Some(&self.name)))
    }

    /// Uploads one local file for use by assistants and tracks it for cleanup.
    pub async fn upload_file(&mut self, path: &Path) -> Result<FileObject, AgentError> {
        info!(event_name = "agent.file.upload", path = %path.display(), "uploading file");
        let bytes = tokio::fs::read(path).await.map_err(|source| AgentError::io(path, source))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        let file = self.api.upload_file(&file_name, bytes).await?;
        self.resources.insert(ResourceKind::File, file.id.clone());
        Ok(file)
    }

    /// Uploads every regular file directly under the data folder, in file-name order.
    ///
    /// Stops at the first failure; files uploaded before it stay tracked.
    pub async fn upload_all_files(&mut self) -> Result<Vec<FileObject>, AgentError> {
        let folder = self.data_folder.clone().ok_or(ArgumentError::Missing("data_folder"))?;
        let paths = list_files(&folder).await?;

        let mut uploaded = Vec::with_capacity(paths.len());
        for path in paths {
            uploaded.push(self.upload_file(&path).await?);
        }
        self.file_ids = self.resources.ids(ResourceKind::File);

        info!(
            event_name = "agent.file.upload_all",
            folder = %folder.display(),
            uploaded = uploaded.len(),
            "data folder uploaded"
        );
        Ok(uploaded)
    }

    async fn thread_for(&mut self, user_id: &str) -> Result<String, AgentError> {
        if let Some(thread_id) = self.user_threads.get(user_id) {
            return Ok(thread_id.clone());
        }

        let thread = self.api.create_thread().await?;
        self.resources.insert(ResourceKind::Thread, thread.id.clone());
        self.user_threads.insert(user_id.to_string(), thread.id.clone());
        info!(
            event_name = "agent.thread.created",
            thread_id = %thread.id,
            user_id,
            "conversation thread created"
        );
        Ok(thread.id)
    }

    /// Sends `prompt` on the user's thread and waits for the assistant's reply.
    pub async fn process_prompt(
        &mut self,
        user_name: &str,
        user_id: &str,
        prompt: &str,
    ) -> Result<PromptReply, AgentError> {
        let correlation_id = Uuid::new_v4().to_string();
        let assistant_id = self
            .assistant
            .as_ref()
            .map(|assistant| assistant.id.clone())
            .ok_or(AgentError::NotProvisioned)?;

        let thread_id = self.thread_for(user_id).await?;
        let message =
            self.api.create_message(&thread_id, &CreateMessageRequest::user(prompt)).await?;

        let request = CreateRunRequest {
            assistant_id,
            additional_instructions: Some(format!("Please address the user as {user_name}.")),
        };
        let run = self.api.create_run(&thread_id, &request).await?;
        info!(
            event_name = "agent.run.created",
            correlation_id = %correlation_id,
            thread_id = %thread_id,
            run_id = %run.id,
            user_id,
            "processing prompt"
        );

        let run = drive_run(
            self.api.as_ref(),
            self.delegate.as_deref(),
            &self.runs,
            &thread_id,
            run,
            &correlation_id,
        )
        .await?;

        if run.status != RunStatus::Completed {
            let message = run
                .last_error
                .as_ref()
                .map(|error| format!("{}: {}", error.code, error.message))
                .unwrap_or_else(|| "no error detail reported".to_string());
            return Err(AgentError::RunEnded { run_id: run.id, status: run.status, message });
        }

        let replies = self.api.list_messages(&thread_id, Some(&message.id)).await?;
        let messages = self.render_messages(&replies);

        Ok(PromptReply { correlation_id, thread_id, run_id: run.id, messages })
    }

    pub fn render_messages(&self, messages: &[Message]) -> Vec<MessageView> {
        render_messages(&self.name, messages)
    }

    /// Downloads a file produced by the assistant, e.g. a code interpreter chart.
    pub async fn read_assistant_file(&self, file_id: &str) -> Result<Vec<u8>, AgentError> {
        Ok(self.api.file_content(file_id).await?)
    }

    /// Writes an assistant file to `dir/{file_id}.png` and returns the path.
    pub async fn save_assistant_file(
        &self,
        file_id: &str,
        dir: &Path,
    ) -> Result<PathBuf, AgentError> {
        let bytes = self.read_assistant_file(file_id).await?;
        tokio::fs::create_dir_all(dir).await.map_err(|source| AgentError::io(dir, source))?;
        let path = dir.join(format!("{file_id}.png"));
        tokio::fs::write(&path, bytes).await.map_err(|source| AgentError::io(&path, source))?;
        info!(event_name = "agent.file.saved", file_id, path = %path.display(), "assistant file saved");
        Ok(path)
    }

    /// Deletes the owned assistant, then threads, then files.
    ///
    /// Deleted handles leave the table, so calling this again only retries
    /// what failed before.
    pub async fn cleanup(&mut self) -> CleanupReport {
        let handles = self.resources.cleanup_order();
        let mut report = CleanupReport::default();

        info!(
            event_name = "agent.cleanup.start",
            assistants = self.resources.count(ResourceKind::Assistant),
            threads = self.resources.count(ResourceKind::Thread),
            files = self.resources.count(ResourceKind::File),
            "deleting remote resources"
        );

        for handle in handles {
            match self.delete_remote(&handle).await {
                Ok(()) => {
                    info!(
                        event_name = "agent.cleanup.deleted",
                        kind = %handle.kind,
                        id = %handle.id,
                        "remote resource deleted"
                    );
                    self.resources.remove(&handle.id);
                    report.deleted.push(handle);
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.cleanup.failed",
                        kind = %handle.kind,
                        id = %handle.id,
                        error = %error,
                        "remote resource could not be deleted"
                    );
                    report.failed.push((handle, error.to_string()));
                }
            }
        }

        if self.owns_assistant_removed(&report) {
            self.assistant = None;
        }
        self.user_threads.retain(|_, thread_id| self.resources.contains(thread_id));
        self.file_ids = self.resources.ids(ResourceKind::File);

        report
    }

    fn owns_assistant_removed(&self, report: &CleanupReport) -> bool {
        self.assistant.as_ref().is_some_and(|assistant| {
            report.deleted.iter().any(|handle| handle.id == assistant.id)
        })
    }

    async fn delete_remote(&self, handle: &ResourceHandle) -> Result<(), AgentError> {
        let status = match handle.kind {
            ResourceKind::Assistant => self.api.delete_assistant(&handle.id).await?,
            ResourceKind::Thread => self.api.delete_thread(&handle.id).await?,
            ResourceKind::File => self.api.delete_file(&handle.id).await?,
        };
        if !status.deleted {
            return Err(AgentError::NotDeleted { kind: handle.kind, id: handle.id.clone() });
        }
        Ok(())
    }
}

impl Drop for AssistantAgent {
    fn drop(&mut self) {
        if self.resources.is_empty() {
            return;
        }
        let leaked: Vec<String> =
            self.resources.iter().map(|handle| format!("{}:{}", handle.kind, handle.id)).collect();
        warn!(
            event_name = "agent.resources.leaked",
            assistant_name = %self.name,
            leaked = ?leaked,
            "agent dropped with live remote resources; call cleanup to delete them"
        );
    }
}

async fn list_files(folder: &Path) -> Result<Vec<PathBuf>, AgentError> {
    let mut entries =
        tokio::fs::read_dir(folder).await.map_err(|source| AgentError::io(folder, source))?;

    let mut files = Vec::new();
    while let Some(entry) =
        entries.next_entry().await.map_err(|source| AgentError::io(folder, source))?
    {
        let path = entry.path();
        // Follows symlinks, so a linked data file is uploaded like a regular one.
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => files.push(path),
            Ok(_) => {
                debug!(event_name = "agent.file.skipped", path = %path.display(), "not a regular file");
            }
            Err(error) => {
                warn!(
                    event_name = "agent.file.skipped",
                    path = %path.display(),
                    error = %error,
                    "data folder entry is unreadable"
                );
            }
        }
    }
    files.sort();
    Ok(files)
}
