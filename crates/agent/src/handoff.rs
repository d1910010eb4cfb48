//! Deferred live-agent handoff.
//!
//! A handoff waits a fixed delay, asks the provider for a short summary of
//! the conversation, then emits `endSession`. The turn never awaits it; the
//! session owns the task and can abort it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use voxturn_config::HandoffConfig;
use voxturn_core::event::{EventSink, SessionEvent};
use voxturn_core::message::Message;
use voxturn_core::provider::{Provider, ProviderRequest};

const SUMMARY_UNAVAILABLE: &str = "Summary unavailable.";

#[derive(Debug, Clone)]
pub struct HandoffSettings {
    pub reason_code: String,
    pub delay: Duration,
    pub summary_prompt: String,
}

impl From<&HandoffConfig> for HandoffSettings {
    fn from(config: &HandoffConfig) -> Self {
        Self {
            reason_code: config.reason_code.clone(),
            delay: Duration::from_millis(config.delay_ms),
            summary_prompt: config.summary_prompt.clone(),
        }
    }
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self::from(&HandoffConfig::default())
    }
}

/// Owns the pending handoff tasks of one session.
#[derive(Debug)]
pub struct HandoffScheduler {
    settings: HandoffSettings,
    tasks: Vec<JoinHandle<()>>,
}

impl HandoffScheduler {
    pub fn new(settings: HandoffSettings) -> Self {
        Self {
            settings,
            tasks: Vec::new(),
        }
    }

    pub fn settings(&self) -> &HandoffSettings {
        &self.settings
    }

    /// Schedule a summary + `endSession` after the configured delay.
    ///
    /// `context` is the conversation as it stands once the turn committed.
    pub fn schedule(
        &mut self,
        provider: Arc<dyn Provider>,
        model: String,
        context: Vec<Message>,
        reason: String,
        sink: EventSink,
    ) {
        self.tasks.retain(|t| !t.is_finished());

        let settings = self.settings.clone();
        info!(
            delay_ms = settings.delay.as_millis() as u64,
            reason = %reason,
            "Scheduling live-agent handoff"
        );

        let handle = tokio::spawn(async move {
            tokio::time::sleep(settings.delay).await;

            let summary = summarize(provider.as_ref(), model, context, &settings.summary_prompt).await;
            info!(reason_code = %settings.reason_code, reason = %reason, "Emitting endSession");
            sink.emit(SessionEvent::EndSession {
                reason_code: settings.reason_code,
                reason,
                conversation_summary: summary,
            });
        });
        self.tasks.push(handle);
    }

    /// Handoffs scheduled and not yet finished.
    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Abort every pending handoff.
    pub fn cancel_all(&mut self) {
        let pending = self.pending();
        if pending > 0 {
            debug!(pending, "Cancelling pending handoffs");
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for HandoffScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn summarize(
    provider: &dyn Provider,
    model: String,
    mut context: Vec<Message>,
    prompt: &str,
) -> String {
    context.push(Message::system(prompt));
    match provider.complete_once(ProviderRequest::new(model, context)).await {
        Ok(response) if !response.content.trim().is_empty() => response.content.trim().to_string(),
        Ok(_) => {
            warn!("Provider returned an empty conversation summary");
            SUMMARY_UNAVAILABLE.to_string()
        }
        Err(e) => {
            warn!(error = %e, "Conversation summary failed");
            SUMMARY_UNAVAILABLE.to_string()
        }
    }
}
