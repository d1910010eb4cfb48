//! The turn orchestrator.
//!
//! One call to [`TurnSession::completion`] runs a full conversational turn:
//!
//! 1. **Append** the caller's input to the session context
//! 2. **Stream** a reply from the provider, with the capability manifest
//! 3. **If content**: narrate it segment by segment, commit it, done
//! 4. **If tool calls**: accumulate their arguments, dispatch them in order,
//!    then stream one follow-up reply over the results
//!
//! Replies and `endSession` notices go out on the session's own
//! [`EventStream`](voxturn_core::EventStream).

pub mod accumulator;
pub mod decoder;
pub mod dispatcher;
pub mod emitter;
pub mod followup;
pub mod handoff;
pub mod injection;
pub mod session;
pub mod turn;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use accumulator::{FinalizedToolCall, ToolCallAccumulator};
pub use decoder::{StreamSignal, Terminal, decode};
pub use dispatcher::{
    DispatchOutcome, HandoffRequest, ToolDispatcher, ToolExecutionResult, merge_arguments,
};
pub use emitter::ReplyEmitter;
pub use handoff::{HandoffScheduler, HandoffSettings};
pub use injection::{DefaultInjectionPolicy, InjectionPolicy, NoInjections, acknowledgement};
pub use session::{SessionConfig, TurnSession};
pub use turn::{TurnReport, TurnState};
