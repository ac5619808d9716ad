use crate::capability::Capability;
use crate::error::ToolError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Executes one tool call.
///
/// Handlers receive the raw arguments sent by the agent and return a JSON
/// result. Unsupported host capabilities are reported as a string result,
/// not as an error.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value, ToolError>;
}

/// Tool description handed to the remote voice SDK.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A named capability bound to its handler. Immutable once built.
#[derive(Clone)]
pub struct Tool {
    capability: Capability,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(capability: Capability, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            capability,
            handler,
        }
    }

    pub fn name(&self) -> &'static str {
        self.capability.name()
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.capability.description().to_string(),
            parameters: self.capability.parameters(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Reads a string argument.
///
/// Accepts `{"<field>": "..."}` or, for single-argument tools, a bare string.
pub(crate) fn string_arg(args: &Value, field: &str) -> Result<String, ToolError> {
    let value = match args {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get(field).and_then(Value::as_str),
        _ => None,
    };
    value
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{field}' must be a string")))
}

/// Reads a numeric argument from `{"<field>": n}`, or a bare number.
pub(crate) fn number_arg(args: &Value, field: &str) -> Result<f64, ToolError> {
    let value = match args {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get(field).and_then(Value::as_f64),
        _ => None,
    };
    value.ok_or_else(|| ToolError::InvalidArguments(format!("'{field}' must be a number")))
}
