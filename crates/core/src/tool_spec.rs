use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A capability declared to the assistants service so it knows what it may request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    CodeInterpreter,
    FileSearch,
    Function { function: FunctionSpec },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self::Function {
            function: FunctionSpec {
                name: name.into(),
                description: Some(description.into()),
                parameters,
            },
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::Function { function } => Some(function.name.as_str()),
            Self::CodeInterpreter | Self::FileSearch => None,
        }
    }
}
