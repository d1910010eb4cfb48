//! Tool dispatch: argument augmentation, invocation, result recording.
//!
//! Calls run one at a time in announcement order. A failing or unknown
//! tool never aborts the turn; it becomes a failed result the model can
//! read in the follow-up.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use voxturn_core::error::{ToolError, TurnError};
use voxturn_core::message::Message;
use voxturn_core::profile::{PhoneNumbers, UserProfile};
use voxturn_core::tool::CapabilityRegistry;

use crate::accumulator::FinalizedToolCall;
use crate::injection::InjectionPolicy;

/// Merge contextual fields into tool arguments. Overrides win.
///
/// Total over any `base`: `null` becomes just the overrides, and a
/// non-object base (e.g. unparseable raw arguments) is kept under
/// `raw_arguments`.
pub fn merge_arguments(base: Value, overrides: Map<String, Value>) -> Value {
    let mut merged = match base {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("raw_arguments".into(), other);
            map
        }
    };
    merged.extend(overrides);
    Value::Object(merged)
}

/// The recorded outcome of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub function_name: String,

    /// The serialized result.
    pub content: String,
    pub success: bool,
}

impl ToolExecutionResult {
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.tool_call_id, &self.content)
    }
}

/// A live-agent handoff requested by a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRequest {
    pub call_id: String,
    pub reason: String,
}

/// Everything one dispatch round produced.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The assistant message recording the calls.
    pub tool_call_message: Message,

    /// One result per call, in announcement order.
    pub results: Vec<ToolExecutionResult>,

    /// System messages for the follow-up request only.
    pub injections: Vec<Message>,

    pub handoffs: Vec<HandoffRequest>,
}

impl DispatchOutcome {
    pub fn result_messages(&self) -> Vec<Message> {
        self.results.iter().map(ToolExecutionResult::to_message).collect()
    }
}

/// Session data a dispatch round may read.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub phone_numbers: &'a PhoneNumbers,
    pub profile: Option<&'a UserProfile>,
}

pub struct ToolDispatcher {
    registry: Arc<CapabilityRegistry>,
    policy: Arc<dyn InjectionPolicy>,
    phone_number_functions: Vec<String>,
    handoff_function: String,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        policy: Arc<dyn InjectionPolicy>,
        phone_number_functions: Vec<String>,
        handoff_function: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            policy,
            phone_number_functions,
            handoff_function: handoff_function.into(),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Run every call sequentially and collect the outcome.
    pub async fn dispatch(
        &self,
        calls: &[FinalizedToolCall],
        ctx: DispatchContext<'_>,
    ) -> DispatchOutcome {
        let tool_call_message =
            Message::assistant_tool_calls(calls.iter().map(FinalizedToolCall::to_ref).collect());

        let mut results = Vec::with_capacity(calls.len());
        let mut injections = Vec::new();
        let mut handoffs = Vec::new();

        for call in calls {
            let (result, value) = self.execute(call, ctx).await;

            if result.success {
                injections.extend(self.policy.injections(&call.function_name, &value, ctx.profile));
            }

            if call.function_name == self.handoff_function {
                if result.success {
                    let reason = value
                        .get("reason")
                        .and_then(Value::as_str)
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or("Caller requested a live agent")
                        .to_string();
                    info!(call_id = %call.id, reason = %reason, "Live-agent handoff requested");
                    handoffs.push(HandoffRequest {
                        call_id: call.id.clone(),
                        reason,
                    });
                } else {
                    warn!(call_id = %call.id, "Handoff capability failed; session stays open");
                }
            }

            results.push(result);
        }

        DispatchOutcome {
            tool_call_message,
            results,
            injections,
            handoffs,
        }
    }

    async fn execute(
        &self,
        call: &FinalizedToolCall,
        ctx: DispatchContext<'_>,
    ) -> (ToolExecutionResult, Value) {
        let mut arguments = call.arguments.clone();
        if self.phone_number_functions.iter().any(|f| f == &call.function_name) {
            arguments = merge_arguments(arguments, ctx.phone_numbers.as_overrides());
        }

        debug!(
            tool = %call.function_name,
            call_id = %call.id,
            arguments = %arguments,
            "Invoking capability"
        );

        let (value, success) = match self.registry.invoke(&call.function_name, arguments).await {
            Ok(value) => (value, true),
            Err(ToolError::NotFound(name)) => {
                let err = TurnError::UnknownTool(name);
                warn!(call_id = %call.id, error = %err, "Unknown tool");
                (failure(&err.to_string()), false)
            }
            Err(e) => {
                warn!(tool = %call.function_name, call_id = %call.id, error = %e, "Capability failed");
                (failure(&e.to_string()), false)
            }
        };

        (
            ToolExecutionResult {
                tool_call_id: call.id.clone(),
                function_name: call.function_name.clone(),
                content: value.to_string(),
                success,
            },
            value,
        )
    }
}

fn failure(message: &str) -> Value {
    json!({ "success": false, "error": message })
}
