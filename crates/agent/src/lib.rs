//! Assistant agent runtime.
//!
//! This crate wraps a hosted assistants service and owns every remote
//! resource it creates on the caller's behalf:
//! - provisions (or reuses) the remote assistant and uploads its data files
//! - relays prompts on per-user conversation threads and polls runs to completion
//! - dispatches function calls from the service to typed local tools
//! - deletes the assistant, threads and files on cleanup
//!
//! # Key Types
//!
//! - `AssistantAgent` - lifecycle owner (see `assistant` module)
//! - `AssistantsApi` - seam to the remote service, with a reqwest client
//! - `ToolRegistry` - tool name to handler map, validated against declared specs
//! - `trading` - stock price and email capabilities plus the agent factory

pub mod api;
pub mod assistant;
pub mod errors;
pub mod messages;
pub mod resources;
pub mod runs;
pub mod tools;
pub mod trading;

pub use api::{ApiError, AssistantsApi, AzureAssistantsClient};
pub use assistant::{AgentOptions, AssistantAgent, PromptReply};
pub use errors::AgentError;
pub use resources::{CleanupReport, ResourceKind};
pub use tools::{FunctionCallDelegate, Tool, ToolRegistry};
