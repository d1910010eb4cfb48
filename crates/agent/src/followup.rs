//! The second round-trip after tools ran.

use std::sync::Arc;

use tracing::{debug, warn};
use voxturn_core::error::TurnError;
use voxturn_core::message::Message;
use voxturn_core::provider::{Provider, ProviderRequest};

use crate::dispatcher::DispatchOutcome;
use crate::turn::{StreamOutcome, TurnDriver};

/// Build the follow-up payload.
///
/// Order: committed context, messages staged earlier in the turn, system
/// injections, the assistant tool-call message, then one result per call.
pub fn build_payload(
    snapshot: Vec<Message>,
    staged: &[Message],
    outcome: &DispatchOutcome,
) -> Vec<Message> {
    let mut payload = snapshot;
    payload.extend_from_slice(staged);
    payload.extend(outcome.injections.iter().cloned());
    payload.push(outcome.tool_call_message.clone());
    payload.extend(outcome.result_messages());
    payload
}

pub struct FollowUpController {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl FollowUpController {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    /// Stream the follow-up reply through the turn's driver.
    ///
    /// Only one tool round-trip per turn: the request carries no tool
    /// manifest, and any tool calls that still come back are dropped.
    pub(crate) async fn run(
        &self,
        driver: &mut TurnDriver,
        payload: Vec<Message>,
    ) -> Result<String, TurnError> {
        debug!(
            turn = driver.turn_sequence(),
            payload_len = payload.len(),
            "Opening follow-up stream"
        );

        let request = ProviderRequest::new(&self.model, payload).with_temperature(self.temperature);
        let rx = self.provider.stream_completion(request).await?;

        driver.end_preamble();
        match driver.drive(rx).await? {
            StreamOutcome::Content(text) => Ok(text),
            StreamOutcome::ToolCalls(calls) => {
                warn!(
                    turn = driver.turn_sequence(),
                    dropped = calls.len(),
                    "Follow-up asked for more tools; ignoring"
                );
                Ok(driver.take_content())
            }
        }
    }
}
