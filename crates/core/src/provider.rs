//! Provider trait — the abstraction over the upstream completion backend.
//!
//! A Provider knows how to send a message payload to an LLM and get back
//! either a stream of [`DeltaEvent`]s or a single complete reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// The payload messages, in order
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tool manifest the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A tool definition sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text
    pub content: String,

    /// Which model actually responded
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of a content reply
    Stop,
    /// The model has finished announcing tool calls
    ToolCalls,
    /// Token limit reached
    Length,
    /// Reply withheld by the provider's filter
    ContentFilter,
    /// Anything else the provider reports
    Other(String),
}

impl FinishReason {
    /// Parse the wire value (`"stop"`, `"tool_calls"`, ...).
    pub fn from_wire(value: &str) -> Self {
        match value {
            "stop" => Self::Stop,
            "tool_calls" => Self::ToolCalls,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A piece of a tool call as it arrives on the stream.
///
/// The first fragment of a call carries `id` and `name`; later fragments
/// carry only an `arguments` piece.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// One incremental unit from a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaEvent {
    /// Partial content text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallFragment>,

    /// Terminal signal, if this event ends the stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl DeltaEvent {
    /// A content-only event.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// The first fragment of a new tool call.
    pub fn tool_call_start(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tool_call: Some(ToolCallFragment {
                id: Some(id.into()),
                name: Some(name.into()),
                arguments: None,
            }),
            ..Self::default()
        }
    }

    /// A follow-on arguments fragment for the current tool call.
    pub fn tool_call_arguments(fragment: impl Into<String>) -> Self {
        Self {
            tool_call: Some(ToolCallFragment {
                arguments: Some(fragment.into()),
                ..ToolCallFragment::default()
            }),
            ..Self::default()
        }
    }

    /// A bare terminal event.
    pub fn finish(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Self::default()
        }
    }
}

/// Receiving half of a provider stream.
pub type DeltaReceiver = mpsc::Receiver<Result<DeltaEvent, ProviderError>>;

/// The core Provider trait.
///
/// The orchestrator calls `stream_completion()` for replies and
/// `complete_once()` for summaries, without knowing which backend is used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete_once(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError>;

    /// Send a request and get a stream of delta events.
    ///
    /// Default implementation calls `complete_once()` and replays the result
    /// as a single content event followed by `stop`.
    async fn stream_completion(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<DeltaReceiver, ProviderError> {
        let response = self.complete_once(request).await?;
        let (tx, rx) = mpsc::channel(2);
        let _ = tx.send(Ok(DeltaEvent::content(response.content))).await;
        let _ = tx.send(Ok(DeltaEvent::finish(FinishReason::Stop))).await;
        Ok(rx)
    }
}
