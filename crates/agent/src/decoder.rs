//! Stream decoding — turns raw provider deltas into ordered signals.
//!
//! One [`DeltaEvent`] may carry a tool-call fragment, a content fragment and
//! a finish reason at once. The decoder fixes the order in which the turn
//! sees them: tool-call fragment first (so pending content is flushed before
//! a new call starts), then content, then the terminal signal.

use voxturn_core::provider::{DeltaEvent, FinishReason};

/// A single decoded unit, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    /// A call identity was reported (first fragment of a call).
    ToolCallAnnounced { id: String, name: String },

    /// An arguments fragment, attributed to the most recently announced call.
    ToolCallArguments(String),

    /// A piece of reply text.
    Content(String),

    /// The stream is finished.
    Finished(Terminal),
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// A content reply ended (`stop`, or any non-tool reason).
    Content(FinishReason),

    /// Tool calls are complete and ready to dispatch.
    ToolCalls,
}

impl From<FinishReason> for Terminal {
    fn from(reason: FinishReason) -> Self {
        match reason {
            FinishReason::ToolCalls => Self::ToolCalls,
            other => Self::Content(other),
        }
    }
}

/// Decode one delta event into zero or more signals.
pub fn decode(event: DeltaEvent) -> Vec<StreamSignal> {
    let mut signals = Vec::with_capacity(2);

    if let Some(fragment) = event.tool_call {
        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            signals.push(StreamSignal::ToolCallAnnounced {
                id,
                name: fragment.name.unwrap_or_default(),
            });
        }
        if let Some(arguments) = fragment.arguments.filter(|a| !a.is_empty()) {
            signals.push(StreamSignal::ToolCallArguments(arguments));
        }
    }

    if let Some(content) = event.content.filter(|c| !c.is_empty()) {
        signals.push(StreamSignal::Content(content));
    }

    if let Some(reason) = event.finish_reason {
        signals.push(StreamSignal::Finished(reason.into()));
    }

    signals
}
