use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use copilot_core::{ArgumentError, ToolSpec};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{AssistantsApi, Run, ToolCall, ToolOutput};
use crate::errors::AgentError;

/// A local capability the assistant may ask to execute.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// Called by the run loop when the service asks for function calls.
///
/// Implementations must submit outputs for the run's pending tool calls
/// exactly once and return the run as the service reports it afterwards.
#[async_trait]
pub trait FunctionCallDelegate: Send + Sync {
    fn validate(&self, _tool_specs: &[ToolSpec]) -> Result<(), ArgumentError> {
        Ok(())
    }

    async fn dispatch_function_call(
        &self,
        api: &dyn AssistantsApi,
        thread_id: &str,
        run: &Run,
    ) -> Result<Run, AgentError>;
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no handler is registered for tool `{0}`")]
    Unknown(String),
    #[error("invalid arguments for `{tool}`: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{tool}` failed: {message}")]
    Failed { tool: String, message: String },
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Every declared function needs a handler and every handler a declaration.
    pub fn validate_against(&self, tool_specs: &[ToolSpec]) -> Result<(), ArgumentError> {
        let declared: BTreeSet<&str> =
            tool_specs.iter().filter_map(ToolSpec::function_name).collect();
        let handled = self.names();

        if let Some(name) = declared.difference(&handled).next() {
            return Err(ArgumentError::UnhandledTool((*name).to_string()));
        }
        if let Some(name) = handled.difference(&declared).next() {
            return Err(ArgumentError::UndeclaredHandler((*name).to_string()));
        }
        Ok(())
    }

    pub async fn execute(&self, name: &str, raw_arguments: &str) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::Unknown(name.to_string()))?;

        let input = if raw_arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str::<Value>(raw_arguments).map_err(|source| {
                ToolError::InvalidArguments { tool: name.to_string(), source }
            })?
        };

        tool.execute(input)
            .await
            .map_err(|error| ToolError::Failed { tool: name.to_string(), message: format!("{error:#}") })
    }

    async fn output_for(&self, call: &ToolCall) -> ToolOutput {
        let output = match self.execute(&call.function.name, &call.function.arguments).await {
            Ok(Value::String(text)) => text,
            Ok(value) => value.to_string(),
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    tool = %call.function.name,
                    tool_call_id = %call.id,
                    error = %error,
                    "tool call failed; reporting the error to the assistant"
                );
                json!({ "error": error.to_string() }).to_string()
            }
        };
        ToolOutput { tool_call_id: call.id.clone(), output }
    }
}

#[async_trait]
impl FunctionCallDelegate for ToolRegistry {
    fn validate(&self, tool_specs: &[ToolSpec]) -> Result<(), ArgumentError> {
        self.validate_against(tool_specs)
    }

    async fn dispatch_function_call(
        &self,
        api: &dyn AssistantsApi,
        thread_id: &str,
        run: &Run,
    ) -> Result<Run, AgentError> {
        let calls = run.tool_calls();
        info!(
            event_name = "agent.tool.dispatch",
            run_id = %run.id,
            thread_id = %thread_id,
            tool_calls = calls.len(),
            "function calling"
        );

        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            outputs.push(self.output_for(call).await);
        }

        info!(
            event_name = "agent.tool.submit",
            run_id = %run.id,
            outputs = outputs.len(),
            "submitting outputs back to the assistant"
        );
        Ok(api.submit_tool_outputs(thread_id, &run.id, outputs).await?)
    }
}
