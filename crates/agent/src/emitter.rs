//! Reply emission with a one-fragment hold-back.
//!
//! The most recent content fragment is held; it is released as a non-final
//! segment when a newer fragment arrives and as the final segment when the
//! turn ends. Every turn produces exactly one final segment, whichever way
//! it ends.

use tracing::{debug, trace};
use voxturn_core::event::EventSink;

#[derive(Debug)]
pub struct ReplyEmitter {
    sink: EventSink,
    turn_sequence: u64,
    held: Option<String>,

    /// When false, fragments go out immediately and the final segment is empty.
    buffer_trailing: bool,
    finalized: bool,
    segments: usize,
}

impl ReplyEmitter {
    pub fn new(sink: EventSink, turn_sequence: u64, buffer_trailing: bool) -> Self {
        Self {
            sink,
            turn_sequence,
            held: None,
            buffer_trailing,
            finalized: false,
            segments: 0,
        }
    }

    pub fn turn_sequence(&self) -> u64 {
        self.turn_sequence
    }

    /// Whether the final segment has gone out.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of segments emitted so far.
    pub fn segments_emitted(&self) -> usize {
        self.segments
    }

    /// Accept a new content fragment.
    pub fn push(&mut self, fragment: &str) {
        if self.finalized || fragment.is_empty() {
            return;
        }
        trace!(turn = self.turn_sequence, fragment, "Content fragment");

        if !self.buffer_trailing {
            self.send(fragment.to_string(), false);
            return;
        }

        if let Some(previous) = self.held.replace(fragment.to_string()) {
            self.send(previous, false);
        }
    }

    /// Emit an out-of-band non-final segment (a tool acknowledgement).
    ///
    /// Anything still held goes out first so generation order is kept.
    pub fn interject(&mut self, text: &str) {
        if self.finalized {
            return;
        }
        if let Some(previous) = self.held.take() {
            self.send(previous, false);
        }
        self.send(text.to_string(), false);
    }

    /// Release the held fragment as the final segment.
    pub fn finish(&mut self) {
        if self.finalized {
            return;
        }
        let text = self.held.take().unwrap_or_default();
        self.send(text, true);
        self.finalized = true;
        debug!(turn = self.turn_sequence, segments = self.segments, "Reply finished");
    }

    /// End the turn with the fallback message, discarding anything held.
    pub fn fail(&mut self, fallback: &str) {
        if self.finalized {
            return;
        }
        self.held = None;
        self.send(fallback.to_string(), true);
        self.finalized = true;
    }

    fn send(&mut self, text: String, is_final: bool) {
        self.sink.reply(text, is_final, self.turn_sequence);
        self.segments += 1;
    }
}
