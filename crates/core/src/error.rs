//! Error types for the voxturn domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

/// The top-level error type for all voxturn operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Turn errors ---
    #[error("Turn error: {0}")]
    Turn(#[from] TurnError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the upstream completion provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures resolving or running a capability.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// The error taxonomy of a single conversational turn.
///
/// Only [`TurnError::Upstream`] aborts a turn; the other variants are
/// recovered where they occur and only surface in logs and tool results.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not parse arguments for tool call {call_id} ({function_name}): {reason}")]
    ToolArgumentParse {
        call_id: String,
        function_name: String,
        reason: String,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] ProviderError),
}

impl TurnError {
    /// Whether this error aborts the turn (as opposed to being recovered in place).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

impl From<ToolError> for TurnError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(name) => Self::UnknownTool(name),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}
