//! Shared test helpers: a scripted streaming provider and mock capabilities.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use voxturn_core::error::{ProviderError, ToolError};
use voxturn_core::provider::{
    CompletionResponse, DeltaEvent, DeltaReceiver, FinishReason, Provider, ProviderRequest,
};
use voxturn_core::tool::Capability;

/// One scripted reply to `stream_completion`.
#[derive(Debug, Clone)]
pub enum Script {
    /// Deliver these events, then close.
    Events(Vec<DeltaEvent>),

    /// Deliver these events, then fail mid-stream.
    FailAfter(Vec<DeltaEvent>, ProviderError),

    /// Refuse to open the stream.
    Refuse(ProviderError),
}

/// A provider that plays back scripted streams in order.
///
/// Panics if more streams are requested than were scripted.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    summaries: Mutex<VecDeque<Result<String, ProviderError>>>,
    stream_requests: Mutex<Vec<ProviderRequest>>,
    summary_requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            summaries: Mutex::new(VecDeque::new()),
            stream_requests: Mutex::new(Vec::new()),
            summary_requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply for the next `complete_once` call.
    pub fn with_summary(self, summary: Result<String, ProviderError>) -> Self {
        self.summaries.lock().unwrap().push_back(summary);
        self
    }

    pub fn stream_requests(&self) -> Vec<ProviderRequest> {
        self.stream_requests.lock().unwrap().clone()
    }

    pub fn summary_requests(&self) -> Vec<ProviderRequest> {
        self.summary_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_once(
        &self,
        request: ProviderRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.summary_requests.lock().unwrap().push(request);
        let content = self
            .summaries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("The caller spoke with the assistant.".into()))?;
        Ok(CompletionResponse {
            content,
            model: "scripted".into(),
            usage: None,
        })
    }

    async fn stream_completion(
        &self,
        request: ProviderRequest,
    ) -> Result<DeltaReceiver, ProviderError> {
        self.stream_requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more scripted streams");

        let (events, failure) = match script {
            Script::Events(events) => (events, None),
            Script::FailAfter(events, err) => (events, Some(err)),
            Script::Refuse(err) => return Err(err),
        };

        let (tx, rx) = mpsc::channel(events.len() + 1);
        for event in events {
            tx.try_send(Ok(event)).unwrap();
        }
        if let Some(err) = failure {
            tx.try_send(Err(err)).unwrap();
        }
        Ok(rx)
    }
}

/// Content fragments followed by `stop`.
pub fn content_stream(fragments: &[&str]) -> Vec<DeltaEvent> {
    let mut events: Vec<DeltaEvent> = fragments.iter().map(|f| DeltaEvent::content(*f)).collect();
    events.push(DeltaEvent::finish(FinishReason::Stop));
    events
}

/// One tool call split over argument fragments, followed by `tool_calls`.
pub fn tool_call_stream(id: &str, name: &str, argument_fragments: &[&str]) -> Vec<DeltaEvent> {
    let mut events = vec![DeltaEvent::tool_call_start(id, name)];
    events.extend(argument_fragments.iter().map(|f| DeltaEvent::tool_call_arguments(*f)));
    events.push(DeltaEvent::finish(FinishReason::ToolCalls));
    events
}

/// A capability that records every argument set it receives.
pub struct RecordingCapability {
    name: String,
    response: Value,
    log: Arc<Mutex<Vec<Value>>>,
}

impl RecordingCapability {
    pub fn new(name: &str, response: Value) -> Self {
        Self {
            name: name.to_string(),
            response,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn log(&self) -> Arc<Mutex<Vec<Value>>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl Capability for RecordingCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records its arguments"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        self.log.lock().unwrap().push(arguments);
        Ok(self.response.clone())
    }
}

/// A capability that always fails.
pub struct FailingCapability {
    name: String,
}

impl FailingCapability {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Capability for FailingCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }

    async fn invoke(&self, _arguments: Value) -> Result<Value, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: "backend unavailable".into(),
        })
    }
}
