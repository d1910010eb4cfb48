//! One turn's stream driver and state machine.
//!
//! ```text
//! Idle → Streaming → ContentTerminal ─────────────────────────────→ Done
//!                  ↘ ToolCallsTerminal → Dispatching → FollowupStreaming → ContentTerminal → Done
//! any error → ErrorState → Done
//! ```
//!
//! The driver feeds decoded signals to the accumulator and the emitter and
//! keeps the messages a turn produces staged until the session commits them.

use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};
use voxturn_core::error::TurnError;
use voxturn_core::message::Message;
use voxturn_core::provider::{DeltaReceiver, FinishReason};

use crate::accumulator::{Announcement, FinalizedToolCall, ToolCallAccumulator};
use crate::decoder::{StreamSignal, Terminal, decode};
use crate::dispatcher::ToolExecutionResult;
use crate::emitter::ReplyEmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Streaming,
    ContentTerminal,
    ToolCallsTerminal,
    Dispatching,
    FollowupStreaming,
    ErrorState,
    Done,
}

/// How a single stream ended.
#[derive(Debug)]
pub enum StreamOutcome {
    /// Reply text accumulated since the last flush (untrimmed).
    Content(String),

    /// Finalized tool calls, in announcement order.
    ToolCalls(Vec<FinalizedToolCall>),
}

/// What a call to `completion` did.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub turn_sequence: u64,

    /// Every state the turn passed through, in order.
    pub states: Vec<TurnState>,

    /// The assistant reply committed for this turn (the fallback on failure).
    pub reply: Option<String>,

    pub tool_results: Vec<ToolExecutionResult>,

    /// Errors recovered in place (argument parse failures, unknown tools).
    pub recovered: Vec<TurnError>,

    /// The error that ended the turn, if any.
    pub error: Option<TurnError>,
}

impl TurnReport {
    pub(crate) fn rejected(turn_sequence: u64, error: TurnError) -> Self {
        Self {
            turn_sequence,
            states: vec![TurnState::Idle],
            reply: None,
            tool_results: Vec::new(),
            recovered: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn used_tools(&self) -> bool {
        self.states.contains(&TurnState::Dispatching)
    }

    pub fn final_state(&self) -> TurnState {
        self.states.last().copied().unwrap_or(TurnState::Idle)
    }
}

pub(crate) struct TurnDriver {
    pub(crate) emitter: ReplyEmitter,
    accumulator: ToolCallAccumulator,

    /// Content since the last flush.
    content: String,

    /// Everything flushed so far this turn, kept as one staged message.
    preamble: String,
    preamble_at: Option<usize>,

    /// Pre-tool content and acknowledgements, not yet committed.
    staged: Vec<Message>,
    states: Vec<TurnState>,
}

impl TurnDriver {
    pub(crate) fn new(emitter: ReplyEmitter) -> Self {
        Self {
            emitter,
            accumulator: ToolCallAccumulator::new(),
            content: String::new(),
            preamble: String::new(),
            preamble_at: None,
            staged: Vec::new(),
            states: vec![TurnState::Idle],
        }
    }

    pub(crate) fn turn_sequence(&self) -> u64 {
        self.emitter.turn_sequence()
    }

    pub(crate) fn transition(&mut self, next: TurnState) {
        let from = self.states.last().copied().unwrap_or(TurnState::Idle);
        trace!(turn = self.turn_sequence(), ?from, to = ?next, "Turn transition");
        self.states.push(next);
    }

    pub(crate) fn states(&self) -> &[TurnState] {
        &self.states
    }

    pub(crate) fn stage(&mut self, message: Message) {
        self.end_preamble();
        self.staged.push(message);
    }

    /// Start a fresh staged message on the next flush.
    pub(crate) fn end_preamble(&mut self) {
        self.preamble.clear();
        self.preamble_at = None;
    }

    pub(crate) fn staged(&self) -> &[Message] {
        &self.staged
    }

    pub(crate) fn take_staged(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.staged)
    }

    pub(crate) fn take_content(&mut self) -> String {
        std::mem::take(&mut self.content)
    }

    /// Stage any pending content as an assistant message.
    ///
    /// Later flushes extend the same message, so text that trails a call
    /// announcement joins the preamble it belongs to.
    pub(crate) fn flush_content(&mut self) {
        let text = std::mem::take(&mut self.content);
        if text.is_empty() {
            return;
        }
        self.preamble.push_str(&text);
        let joined = self.preamble.trim();
        if joined.is_empty() {
            return;
        }
        debug!(turn = self.turn_sequence(), "Flushing content ahead of tool call");
        match self.preamble_at {
            Some(i) => self.staged[i] = Message::assistant(joined),
            None => {
                self.preamble_at = Some(self.staged.len());
                self.staged.push(Message::assistant(joined));
            }
        }
    }

    /// Consume one provider stream until it ends.
    pub(crate) async fn drive(&mut self, rx: DeltaReceiver) -> Result<StreamOutcome, TurnError> {
        let mut stream = ReceiverStream::new(rx);

        while let Some(item) = stream.next().await {
            for signal in decode(item?) {
                match signal {
                    StreamSignal::ToolCallAnnounced { id, name } => {
                        if self.accumulator.announce(&id, &name) == Announcement::New {
                            self.flush_content();
                        }
                    }
                    StreamSignal::ToolCallArguments(fragment) => {
                        self.accumulator.push_arguments(&fragment);
                    }
                    StreamSignal::Content(text) => {
                        self.content.push_str(&text);
                        self.emitter.push(&text);
                    }
                    StreamSignal::Finished(Terminal::ToolCalls) => {
                        if self.accumulator.is_empty() {
                            warn!(turn = self.turn_sequence(), "tool_calls finish with no tool calls");
                            return Ok(StreamOutcome::Content(self.take_content()));
                        }
                        return Ok(StreamOutcome::ToolCalls(self.accumulator.finalize()));
                    }
                    StreamSignal::Finished(Terminal::Content(reason)) => {
                        if reason != FinishReason::Stop {
                            warn!(turn = self.turn_sequence(), ?reason, "Reply ended early");
                        }
                        return Ok(StreamOutcome::Content(self.take_content()));
                    }
                }
            }
        }

        warn!(turn = self.turn_sequence(), "Stream closed without a finish reason");
        if self.accumulator.is_empty() {
            Ok(StreamOutcome::Content(self.take_content()))
        } else {
            Ok(StreamOutcome::ToolCalls(self.accumulator.finalize()))
        }
    }
}
