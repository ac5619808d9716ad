use thiserror::Error;

/// Error raised by a tool handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

/// Error raised when dispatching a call through a [`ToolRegistry`](crate::ToolRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("tool '{name}' crashed: {message}")]
    Panicked { name: String, message: String },
}
