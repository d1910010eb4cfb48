//! # voxturn Core
//!
//! Domain types, traits, and error definitions for the voxturn turn
//! orchestrator. This crate defines the model every other crate implements
//! against: messages and the append-only context store, the streaming
//! provider trait, the capability registry, and session events.

pub mod error;
pub mod event;
pub mod message;
pub mod profile;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError, TurnError};
pub use event::{EventSink, EventStream, ReplySegment, SessionEvent};
pub use message::{ContextStore, Message, Role, SessionId, ToolCallRef};
pub use profile::{PhoneNumbers, UserProfile};
pub use provider::{
    CompletionResponse, DeltaEvent, DeltaReceiver, FinishReason, Provider, ProviderRequest,
    ToolCallFragment, ToolDefinition,
};
pub use tool::{Capability, CapabilityRegistry};
