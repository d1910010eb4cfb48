//! Session events — everything the caller observes from a session.
//!
//! Each session owns one [`EventSink`]; the caller holds the matching
//! [`EventStream`]. There is no process-wide emitter, so listeners never
//! leak across sessions or turns.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One caller-visible piece of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplySegment {
    pub text: String,
    pub is_final: bool,
    pub turn_sequence: u64,
}

/// All events a session emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A reply segment for narration.
    GptReply(ReplySegment),

    /// The session should be terminated (e.g. after a live-agent handoff).
    EndSession {
        reason_code: String,
        reason: String,
        conversation_summary: String,
    },
}

impl SessionEvent {
    /// Wire name of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GptReply(_) => "gptreply",
            Self::EndSession { .. } => "endSession",
        }
    }

    /// The reply segment, if this is one.
    pub fn as_reply(&self) -> Option<&ReplySegment> {
        match self {
            Self::GptReply(segment) => Some(segment),
            Self::EndSession { .. } => None,
        }
    }
}

/// Sending half owned by the session.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

/// Receiving half owned by the caller.
pub type EventStream = mpsc::UnboundedReceiver<SessionEvent>;

impl EventSink {
    /// Create a connected sink/stream pair.
    pub fn channel() -> (Self, EventStream) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Deliver an event to the caller.
    pub fn emit(&self, event: SessionEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.sender.send(event);
    }

    /// Deliver a reply segment.
    pub fn reply(&self, text: impl Into<String>, is_final: bool, turn_sequence: u64) {
        self.emit(SessionEvent::GptReply(ReplySegment {
            text: text.into(),
            is_final,
            turn_sequence,
        }));
    }

    /// Whether the caller has dropped its stream.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
