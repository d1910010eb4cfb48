//! Tool-call accumulation across stream fragments.
//!
//! State machine: `Idle → Collecting(id) → Finalized`. Calls are keyed by
//! id and kept in announcement order; an arguments fragment always belongs
//! to the most recently announced call.

use serde_json::Value;
use tracing::{debug, warn};
use voxturn_core::error::TurnError;
use voxturn_core::message::ToolCallRef;

/// Where the accumulator is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorState {
    Idle,
    Collecting(String),
    Finalized,
}

/// A call whose arguments are still arriving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToolCall {
    pub id: String,
    pub function_name: String,
    pub arguments_buffer: String,
}

/// A call ready for dispatch.
#[derive(Debug, Clone)]
pub struct FinalizedToolCall {
    pub id: String,
    pub function_name: String,

    /// Exactly what arrived on the stream, concatenated.
    pub raw_arguments: String,

    /// Parsed arguments, or the raw string when parsing failed.
    pub arguments: Value,

    /// Set when `raw_arguments` was not valid JSON.
    pub parse_error: Option<TurnError>,
}

impl FinalizedToolCall {
    /// The reference recorded in the assistant tool-call message.
    pub fn to_ref(&self) -> ToolCallRef {
        ToolCallRef {
            id: self.id.clone(),
            name: self.function_name.clone(),
            arguments: self.arguments.to_string(),
        }
    }
}

/// Result of reporting a call id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    /// First time this id was seen; pending content must be flushed.
    New,
    /// The id was already tracked; collection resumes on it.
    Resumed,
}

#[derive(Debug)]
pub struct ToolCallAccumulator {
    state: AccumulatorState,
    calls: Vec<PendingToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self {
            state: AccumulatorState::Idle,
            calls: Vec::new(),
        }
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    /// Calls tracked so far, in announcement order.
    pub fn pending(&self) -> &[PendingToolCall] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Report a call identity seen on the stream.
    pub fn announce(&mut self, id: &str, function_name: &str) -> Announcement {
        if self.state == AccumulatorState::Finalized {
            self.state = AccumulatorState::Idle;
        }

        let announcement = if self.calls.iter().any(|c| c.id == id) {
            Announcement::Resumed
        } else {
            debug!(call_id = %id, tool = %function_name, "Detected new tool call");
            self.calls.push(PendingToolCall {
                id: id.to_string(),
                function_name: function_name.to_string(),
                arguments_buffer: String::new(),
            });
            Announcement::New
        };

        self.state = AccumulatorState::Collecting(id.to_string());
        announcement
    }

    /// Append an arguments fragment to the call being collected.
    ///
    /// Returns `false` (and drops the fragment) when no call is being collected.
    pub fn push_arguments(&mut self, fragment: &str) -> bool {
        let AccumulatorState::Collecting(current) = &self.state else {
            warn!(fragment, "Arguments fragment arrived with no tool call in progress");
            return false;
        };

        match self.calls.iter_mut().find(|c| &c.id == current) {
            Some(call) => {
                call.arguments_buffer.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Finalize every tracked call and clear the accumulator.
    ///
    /// Malformed arguments never fail the batch: the raw string is kept and
    /// the parse error travels with the call.
    pub fn finalize(&mut self) -> Vec<FinalizedToolCall> {
        self.state = AccumulatorState::Finalized;
        std::mem::take(&mut self.calls)
            .into_iter()
            .map(finalize_call)
            .collect()
    }
}

impl Default for ToolCallAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

fn finalize_call(call: PendingToolCall) -> FinalizedToolCall {
    let PendingToolCall {
        id,
        function_name,
        arguments_buffer,
    } = call;

    // No fragments at all means "no arguments".
    if arguments_buffer.trim().is_empty() {
        return FinalizedToolCall {
            id,
            function_name,
            raw_arguments: arguments_buffer,
            arguments: Value::Object(serde_json::Map::new()),
            parse_error: None,
        };
    }

    match serde_json::from_str::<Value>(&arguments_buffer) {
        Ok(arguments) => FinalizedToolCall {
            id,
            function_name,
            raw_arguments: arguments_buffer,
            arguments,
            parse_error: None,
        },
        Err(e) => {
            let error = TurnError::ToolArgumentParse {
                call_id: id.clone(),
                function_name: function_name.clone(),
                reason: e.to_string(),
            };
            warn!(error = %error, "Falling back to raw arguments");
            FinalizedToolCall {
                id,
                function_name,
                arguments: Value::String(arguments_buffer.clone()),
                raw_arguments: arguments_buffer,
                parse_error: Some(error),
            }
        }
    }
}
