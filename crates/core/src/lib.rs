pub mod config;
pub mod errors;
pub mod tool_spec;

pub use config::{AgentConfig, AppConfig, ConfigError, LoadOptions};
pub use errors::ArgumentError;
pub use tool_spec::{FunctionSpec, ToolSpec};
