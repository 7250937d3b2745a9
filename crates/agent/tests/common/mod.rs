#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use copilot_agent::api::{
    ApiError, Assistant, AssistantsApi, CreateAssistantRequest, CreateMessageRequest,
    CreateRunRequest, DeletionStatus, FileObject, Message, MessageContent, MessageRole, Run,
    RunStatus, Thread, ToolOutput,
};
use copilot_agent::api::types::{
    FunctionCall, RequiredAction, SubmitToolOutputsAction, TextContent, ToolCall,
};
use copilot_core::AgentConfig;

/// Records every request; runs follow a scripted sequence of statuses.
#[derive(Default)]
pub struct FakeAssistants {
    pub state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub next_id: u32,
    pub existing_assistants: Vec<Assistant>,
    pub created_assistants: Vec<CreateAssistantRequest>,
    pub uploads: Vec<(String, Vec<u8>)>,
    pub fail_upload_named: Option<String>,
    pub fail_delete_id: Option<String>,
    pub not_deleted_id: Option<String>,
    pub threads_created: usize,
    pub messages: Vec<(String, Message)>,
    pub runs_created: Vec<(String, CreateRunRequest)>,
    pub scripted_runs: VecDeque<Run>,
    pub after_submit: VecDeque<Run>,
    pub submissions: Vec<(String, Vec<ToolOutput>)>,
    pub assistant_reply: String,
    pub deleted_assistants: Vec<String>,
    pub deleted_threads: Vec<String>,
    pub deleted_files: Vec<String>,
    pub api_calls: usize,
}

impl FakeAssistants {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.with_state(|state| state.assistant_reply = "Done.".to_string());
        fake
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().expect("fake state lock");
        f(&mut state)
    }

    fn call<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        self.with_state(|state| {
            state.api_calls += 1;
            f(state)
        })
    }
}

impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }
}

pub fn agent_config() -> AgentConfig {
    AgentConfig {
        api_key: "test-key".to_string().into(),
        api_version: "2024-05-01-preview".to_string(),
        api_endpoint: "https://example.openai.azure.com".to_string(),
        model_deployment: "gpt-4o".to_string(),
        email_uri: None,
    }
}

pub fn run(id: &str, thread_id: &str, status: RunStatus) -> Run {
    Run {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        assistant_id: String::new(),
        status,
        required_action: None,
        last_error: None,
    }
}

pub fn requires_action(id: &str, thread_id: &str, calls: &[(&str, &str, &str)]) -> Run {
    let tool_calls = calls
        .iter()
        .map(|(call_id, name, arguments)| ToolCall {
            id: call_id.to_string(),
            kind: "function".to_string(),
            function: FunctionCall { name: name.to_string(), arguments: arguments.to_string() },
        })
        .collect();
    Run {
        required_action: Some(RequiredAction {
            kind: "submit_tool_outputs".to_string(),
            submit_tool_outputs: Some(SubmitToolOutputsAction { tool_calls }),
        }),
        ..run(id, thread_id, RunStatus::RequiresAction)
    }
}

fn deleted(id: &str) -> DeletionStatus {
    DeletionStatus { id: id.to_string(), deleted: true }
}

fn kept(id: &str) -> DeletionStatus {
    DeletionStatus { id: id.to_string(), deleted: false }
}

#[async_trait]
impl AssistantsApi for FakeAssistants {
    async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<Assistant, ApiError> {
        self.call(|state| {
            state.created_assistants.push(request.clone());
            Ok(Assistant {
                id: state.id("asst"),
                name: Some(request.name.clone()),
                model: request.model.clone(),
                created_at: 0,
            })
        })
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, ApiError> {
        self.call(|state| Ok(state.existing_assistants.clone()))
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus, ApiError> {
        self.call(|state| {
            if state.fail_delete_id.as_deref() == Some(assistant_id) {
                return Err(ApiError::Status { status: 500, body: "boom".to_string() });
            }
            if state.not_deleted_id.as_deref() == Some(assistant_id) {
                return Ok(kept(assistant_id));
            }
            state.deleted_assistants.push(assistant_id.to_string());
            Ok(deleted(assistant_id))
        })
    }

    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileObject, ApiError> {
        self.call(|state| {
            if state.fail_upload_named.as_deref() == Some(file_name) {
                return Err(ApiError::Status { status: 400, body: "bad file".to_string() });
            }
            state.uploads.push((file_name.to_string(), bytes.clone()));
            Ok(FileObject {
                id: state.id("file"),
                filename: file_name.to_string(),
                bytes: Some(bytes.len() as u64),
                purpose: "assistants".to_string(),
            })
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<DeletionStatus, ApiError> {
        self.call(|state| {
            if state.fail_delete_id.as_deref() == Some(file_id) {
                return Err(ApiError::Status { status: 500, body: "boom".to_string() });
            }
            if state.not_deleted_id.as_deref() == Some(file_id) {
                return Ok(kept(file_id));
            }
            state.deleted_files.push(file_id.to_string());
            Ok(deleted(file_id))
        })
    }

    async fn file_content(&self, file_id: &str) -> Result<Vec<u8>, ApiError> {
        self.call(|_| Ok(format!("png:{file_id}").into_bytes()))
    }

    async fn create_thread(&self) -> Result<Thread, ApiError> {
        self.call(|state| {
            state.threads_created += 1;
            Ok(Thread { id: state.id("thread"), created_at: 0 })
        })
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<DeletionStatus, ApiError> {
        self.call(|state| {
            if state.not_deleted_id.as_deref() == Some(thread_id) {
                return Ok(kept(thread_id));
            }
            state.deleted_threads.push(thread_id.to_string());
            Ok(deleted(thread_id))
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> Result<Message, ApiError> {
        self.call(|state| {
            let message = Message {
                id: state.id("msg"),
                thread_id: thread_id.to_string(),
                role: request.role,
                created_at: i64::from(state.next_id),
                run_id: None,
                content: vec![MessageContent::Text {
                    text: TextContent { value: request.content.clone() },
                }],
            };
            state.messages.push((thread_id.to_string(), message.clone()));
            Ok(message)
        })
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<Message>, ApiError> {
        self.call(|state| {
            let mut in_thread: Vec<Message> = state
                .messages
                .iter()
                .filter(|(thread, _)| thread == thread_id)
                .map(|(_, message)| message.clone())
                .collect();
            if let Some(after) = after {
                if let Some(position) = in_thread.iter().position(|message| message.id == after) {
                    in_thread.drain(..=position);
                }
            }
            Ok(in_thread)
        })
    }

    async fn create_run(
        &self,
        thread_id: &str,
        request: &CreateRunRequest,
    ) -> Result<Run, ApiError> {
        self.call(|state| {
            state.runs_created.push((thread_id.to_string(), request.clone()));
            let first = state
                .scripted_runs
                .pop_front()
                .unwrap_or_else(|| run("run_1", thread_id, RunStatus::Completed));
            Ok(settle(state, thread_id, first))
        })
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        self.call(|state| {
            let next = state
                .scripted_runs
                .pop_front()
                .unwrap_or_else(|| run(run_id, thread_id, RunStatus::Completed));
            Ok(settle(state, thread_id, next))
        })
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> Result<Run, ApiError> {
        self.call(|state| {
            state.submissions.push((run_id.to_string(), tool_outputs));
            let next = state
                .after_submit
                .pop_front()
                .unwrap_or_else(|| run(run_id, thread_id, RunStatus::Queued));
            Ok(settle(state, thread_id, next))
        })
    }
}

/// Adds the assistant's reply to the thread once a run completes.
fn settle(state: &mut FakeState, thread_id: &str, run: Run) -> Run {
    if run.status == RunStatus::Completed {
        let reply = Message {
            id: state.id("msg"),
            thread_id: thread_id.to_string(),
            role: MessageRole::Assistant,
            created_at: i64::from(state.next_id),
            run_id: Some(run.id.clone()),
            content: vec![MessageContent::Text {
                text: TextContent { value: state.assistant_reply.clone() },
            }],
        };
        state.messages.push((thread_id.to_string(), reply));
    }
    run
}
