//! End-to-end turn tests through the public `TurnSession` API.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use voxturn_agent::{SessionConfig, TurnSession, TurnState};
use voxturn_core::{
    Capability, CapabilityRegistry, CompletionResponse, DeltaEvent, DeltaReceiver, EventStream,
    FinishReason, Provider, ProviderError, ProviderRequest, ReplySegment, Role, SessionEvent,
    ToolError, TurnError, UserProfile,
};

// ── Mocks ──────────────────────────────────────────────────────────────────

type Scripted = Vec<Result<DeltaEvent, ProviderError>>;

struct MockProvider {
    replies: Mutex<VecDeque<Scripted>>,
    summary: String,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            summary: "The caller asked to speak with a leasing agent.".into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete_once(
        &self,
        _request: ProviderRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        Ok(CompletionResponse {
            content: self.summary.clone(),
            model: "mock".into(),
            usage: None,
        })
    }

    async fn stream_completion(
        &self,
        request: ProviderRequest,
    ) -> Result<DeltaReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let events = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left");
        let (tx, rx) = mpsc::channel(events.len() + 1);
        for event in events {
            tx.try_send(event).unwrap();
        }
        Ok(rx)
    }
}

/// Records `start:<name>` / `end:<name>` around a short await.
struct TracedCapability {
    name: &'static str,
    response: Value,
    trace: Arc<Mutex<Vec<String>>>,
    arguments: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Capability for TracedCapability {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "traced"
    }
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        self.trace.lock().unwrap().push(format!("start:{}", self.name));
        self.arguments.lock().unwrap().push(arguments);
        tokio::task::yield_now().await;
        self.trace.lock().unwrap().push(format!("end:{}", self.name));
        Ok(self.response.clone())
    }
}

struct Harness {
    trace: Arc<Mutex<Vec<String>>>,
    arguments: Arc<Mutex<Vec<Value>>>,
    registry: CapabilityRegistry,
}

impl Harness {
    fn new() -> Self {
        Self {
            trace: Arc::new(Mutex::new(Vec::new())),
            arguments: Arc::new(Mutex::new(Vec::new())),
            registry: CapabilityRegistry::new(),
        }
    }

    fn with(mut self, name: &'static str, response: Value) -> Self {
        self.registry.register(Arc::new(TracedCapability {
            name,
            response,
            trace: Arc::clone(&self.trace),
            arguments: Arc::clone(&self.arguments),
        }));
        self
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn content(fragments: &[&str]) -> Scripted {
    let mut events: Vec<_> = fragments.iter().map(|f| Ok(DeltaEvent::content(*f))).collect();
    events.push(Ok(DeltaEvent::finish(FinishReason::Stop)));
    events
}

fn drain(stream: &mut EventStream) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = stream.try_recv() {
        out.push(event);
    }
    out
}

fn segments(events: &[SessionEvent]) -> Vec<ReplySegment> {
    events.iter().filter_map(|e| e.as_reply().cloned()).collect()
}

fn start(
    replies: Vec<Scripted>,
    registry: CapabilityRegistry,
) -> (TurnSession, EventStream, Arc<MockProvider>) {
    let provider = Arc::new(MockProvider::new(replies));
    let (session, stream) =
        TurnSession::new(provider.clone(), Arc::new(registry), SessionConfig::default());
    (session, stream, provider)
}

// ── Properties ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_input_changes_nothing() {
    let (mut session, mut stream, provider) = start(vec![], CapabilityRegistry::new());

    let report = session.completion("", 1, Role::User, false).await;
    assert!(matches!(report.error, Some(TurnError::InvalidInput(_))));

    assert!(session.context().is_empty());
    assert!(drain(&mut stream).is_empty());
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn whitespace_input_is_a_real_turn() {
    let (mut session, mut stream, provider) =
        start(vec![content(&["Sorry, I didn't catch that."])], CapabilityRegistry::new());

    let report = session.completion("  ", 1, Role::User, false).await;
    assert!(report.is_ok());

    assert_eq!(provider.requests().len(), 1);
    assert_eq!(session.context().messages()[0].text(), "  ");
    assert_eq!(segments(&drain(&mut stream)).len(), 1);
}

#[tokio::test]
async fn content_only_reply_is_narrated_then_committed() {
    let fragments = ["  Our office ", "opens ", "at nine", ". "];
    let (mut session, mut stream, _) = start(vec![content(&fragments)], CapabilityRegistry::new());

    let report = session.completion("When do you open?", 2, Role::User, false).await;
    assert!(report.is_ok());
    assert!(!report.used_tools());

    let segs = segments(&drain(&mut stream));
    let finals: Vec<_> = segs.iter().filter(|s| s.is_final).collect();
    assert_eq!(finals.len(), 1);
    assert!(segs.last().unwrap().is_final);
    assert!(segs.iter().all(|s| s.turn_sequence == 2));

    // Non-final texts are everything but the final piece, in order.
    let non_final: String = segs.iter().filter(|s| !s.is_final).map(|s| s.text.as_str()).collect();
    assert_eq!(non_final, "  Our office opens at nine");
    assert_eq!(finals[0].text, ". ");

    let messages = session.context().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].text(), "Our office opens at nine.");
}

#[tokio::test]
async fn split_arguments_are_reassembled() {
    let harness = Harness::new().with("scheduleTour", json!({"available": false}));
    let arguments = Arc::clone(&harness.arguments);

    let mut first = vec![Ok(DeltaEvent::tool_call_start("call_1", "scheduleTour"))];
    for fragment in ["{\"date\":", " \"2026-10-21\",", " \"time\": ", "\"3pm\"}"] {
        first.push(Ok(DeltaEvent::tool_call_arguments(fragment)));
    }
    first.push(Ok(DeltaEvent::finish(FinishReason::ToolCalls)));

    let (mut session, _stream, _) =
        start(vec![first, content(&["Booked."])], harness.registry);
    let report = session.completion("Book a tour", 1, Role::User, false).await;

    assert!(report.is_ok());
    assert!(report.recovered.is_empty());
    assert_eq!(
        arguments.lock().unwrap()[0],
        json!({"date": "2026-10-21", "time": "3pm"})
    );
}

#[tokio::test]
async fn invalid_arguments_reach_the_tool_raw() {
    let harness = Harness::new().with("checkAvailability", json!({"slots": []}));
    let arguments = Arc::clone(&harness.arguments);

    let first = vec![
        Ok(DeltaEvent::tool_call_start("call_1", "checkAvailability")),
        Ok(DeltaEvent::tool_call_arguments("{\"date\": next week")),
        Ok(DeltaEvent::finish(FinishReason::ToolCalls)),
    ];
    let (mut session, _stream, _) =
        start(vec![first, content(&["Nothing open."])], harness.registry);
    let report = session.completion("Anything next week?", 1, Role::User, false).await;

    assert!(report.is_ok());
    assert!(matches!(
        report.recovered.as_slice(),
        [TurnError::ToolArgumentParse { function_name, .. }] if function_name == "checkAvailability"
    ));
    assert_eq!(
        arguments.lock().unwrap()[0],
        Value::String("{\"date\": next week".into())
    );
}

#[tokio::test]
async fn calls_run_sequentially_in_announcement_order() {
    let harness = Harness::new()
        .with("checkAvailability", json!({"slots": ["3pm"]}))
        .with("commonInquiries", json!({"answer": "Cats are allowed."}));
    let trace = Arc::clone(&harness.trace);

    let first = vec![
        Ok(DeltaEvent::tool_call_start("call_a", "checkAvailability")),
        Ok(DeltaEvent::tool_call_arguments("{}")),
        Ok(DeltaEvent::tool_call_start("call_b", "commonInquiries")),
        Ok(DeltaEvent::tool_call_arguments("{\"topic\":\"pets\"}")),
        Ok(DeltaEvent::finish(FinishReason::ToolCalls)),
    ];
    let (mut session, _stream, provider) =
        start(vec![first, content(&["3pm works, and cats are fine."])], harness.registry);
    let report = session.completion("Tour at 3 and pets?", 1, Role::User, false).await;

    assert_eq!(
        *trace.lock().unwrap(),
        vec![
            "start:checkAvailability",
            "end:checkAvailability",
            "start:commonInquiries",
            "end:commonInquiries"
        ]
    );
    let ids: Vec<&str> = report.tool_results.iter().map(|r| r.tool_call_id.as_str()).collect();
    assert_eq!(ids, vec!["call_a", "call_b"]);

    // The follow-up sees one result per call id.
    let follow_up = &provider.requests()[1];
    let tool_ids: Vec<&str> = follow_up
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(tool_ids, vec!["call_a", "call_b"]);
}

#[tokio::test]
async fn mid_stream_failure_sends_one_fallback() {
    let failing = vec![
        Ok(DeltaEvent::content("Let me")),
        Err(ProviderError::StreamInterrupted("connection reset".into())),
    ];
    let (mut session, mut stream, _) = start(vec![failing], CapabilityRegistry::new());

    let before = session.context().len();
    let report = session.completion("Hello?", 5, Role::User, false).await;
    assert!(matches!(report.error, Some(TurnError::Upstream(_))));
    assert_eq!(report.final_state(), TurnState::Done);

    assert_eq!(session.context().len(), before + 2);
    let fallback = SessionConfig::default().fallback_message;
    assert_eq!(session.context().last().unwrap().text(), fallback);

    let events = drain(&mut stream);
    assert_eq!(events.len(), 1);
    let segs = segments(&events);
    assert!(segs[0].is_final);
    assert_eq!(segs[0].text, fallback);
}

#[tokio::test]
async fn preamble_before_tool_call_is_kept() {
    let harness = Harness::new().with("commonInquiries", json!({"answer": "Yes."}));
    let first = vec![
        Ok(DeltaEvent::content("One moment. ")),
        Ok(DeltaEvent::tool_call_start("call_1", "commonInquiries")),
        Ok(DeltaEvent::tool_call_arguments("{}")),
        Ok(DeltaEvent::finish(FinishReason::ToolCalls)),
    ];
    let (mut session, mut stream, _) =
        start(vec![first, content(&["Yes, ", "there is parking."])], harness.registry);
    session.completion("Is there parking?", 1, Role::User, false).await;

    let roles: Vec<Role> = session.context().messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(session.context().messages()[1].text(), "One moment.");

    // The held preamble goes out when the follow-up starts.
    let texts: Vec<(String, bool)> = segments(&drain(&mut stream))
        .into_iter()
        .map(|s| (s.text, s.is_final))
        .collect();
    assert_eq!(
        texts,
        vec![
            ("One moment. ".into(), false),
            ("Yes, ".into(), false),
            ("there is parking.".into(), true),
        ]
    );
}

#[tokio::test]
async fn apartment_listing_example() {
    let harness = Harness::new().with(
        "listAvailableApartments",
        json!([{"unit": "1A"}, {"unit": "2B"}, {"unit": "3C"}]),
    );
    let arguments = Arc::clone(&harness.arguments);

    let first = vec![
        Ok(DeltaEvent::tool_call_start("call_1", "listAvailableApartments")),
        Ok(DeltaEvent::finish(FinishReason::ToolCalls)),
    ];
    let (mut session, mut stream, provider) = start(
        vec![first, content(&["We have 3 units available..."])],
        harness.registry,
    );
    let report = session
        .completion("What apartments are available?", 1, Role::User, false)
        .await;

    assert!(report.is_ok());
    assert_eq!(
        report.states,
        vec![
            TurnState::Idle,
            TurnState::Streaming,
            TurnState::ToolCallsTerminal,
            TurnState::Dispatching,
            TurnState::FollowupStreaming,
            TurnState::ContentTerminal,
            TurnState::Done,
        ]
    );
    assert_eq!(arguments.lock().unwrap()[0], json!({}));

    // The first request carried the manifest; the follow-up carried the injection.
    let requests = provider.requests();
    assert_eq!(requests[0].tools.len(), 1);
    assert!(
        requests[1]
            .messages
            .iter()
            .any(|m| m.role == Role::System && m.text().contains("summary of available apartments"))
    );

    let segs = segments(&drain(&mut stream));
    assert_eq!(segs.len(), 1);
    assert!(segs[0].is_final);
    assert_eq!(segs[0].text, "We have 3 units available...");

    let messages = session.context().messages();
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert_eq!(messages[1].tool_calls[0].name, "listAvailableApartments");
    assert_eq!(messages[3].text(), "We have 3 units available...");
    // Injections steer the follow-up only.
    assert!(messages.iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn unknown_tool_does_not_end_the_turn() {
    let first = vec![
        Ok(DeltaEvent::tool_call_start("call_1", "bookParking")),
        Ok(DeltaEvent::tool_call_arguments("{}")),
        Ok(DeltaEvent::finish(FinishReason::ToolCalls)),
    ];
    let (mut session, _stream, provider) =
        start(vec![first, content(&["I can't book parking."])], CapabilityRegistry::new());
    let report = session.completion("Book me parking", 1, Role::User, false).await;

    assert!(report.is_ok());
    assert!(matches!(report.recovered.as_slice(), [TurnError::UnknownTool(name)] if name == "bookParking"));
    assert!(!report.tool_results[0].success);

    let follow_up = &provider.requests()[1];
    let result = follow_up.messages.iter().find(|m| m.role == Role::Tool).unwrap();
    let payload: Value = serde_json::from_str(result.text()).unwrap();
    assert_eq!(payload["success"], false);
}

#[tokio::test]
async fn phone_numbers_are_merged_into_sms_arguments() {
    let harness = Harness::new().with("sendAppointmentConfirmationSms", json!({"sent": true}));
    let arguments = Arc::clone(&harness.arguments);

    let first = vec![
        Ok(DeltaEvent::tool_call_start("call_1", "sendAppointmentConfirmationSms")),
        Ok(DeltaEvent::tool_call_arguments("{\"appointmentDate\":\"Friday\"}")),
        Ok(DeltaEvent::finish(FinishReason::ToolCalls)),
    ];
    let (mut session, _stream, _) = start(vec![first, content(&["Sent!"])], harness.registry);
    session.set_phone_numbers("+15550100", "+15550199");
    session.completion("Text me the details", 1, Role::User, false).await;

    assert_eq!(
        arguments.lock().unwrap()[0],
        json!({"appointmentDate": "Friday", "to": "+15550100", "from": "+15550199"})
    );
}

#[tokio::test]
async fn profile_personalizes_availability_follow_up() {
    let harness = Harness::new().with("checkAvailability", json!({"slots": []}));
    let first = vec![
        Ok(DeltaEvent::tool_call_start("call_1", "checkAvailability")),
        Ok(DeltaEvent::finish(FinishReason::ToolCalls)),
    ];
    let (mut session, _stream, provider) =
        start(vec![first, content(&["Let me see."])], harness.registry);
    let profile: UserProfile = serde_json::from_value(json!({
        "profile": { "firstName": "Jane", "moveInDate": "2026-12-01" }
    }))
    .unwrap();
    session.set_user_profile(profile);
    session.completion("Is anything open?", 1, Role::User, false).await;

    let follow_up = &provider.requests()[1];
    assert!(follow_up.messages.iter().any(|m| {
        m.text() == "When checking availability for Jane, remember that they are looking to move in on 2026-12-01."
    }));
}

#[tokio::test(start_paused = true)]
async fn handoff_ends_the_session_after_the_delay() {
    let harness = Harness::new().with(
        "liveAgentHandoff",
        json!({"reason": "The caller wants to discuss a billing dispute."}),
    );
    let first = vec![
        Ok(DeltaEvent::tool_call_start("call_1", "liveAgentHandoff")),
        Ok(DeltaEvent::tool_call_arguments("{}")),
        Ok(DeltaEvent::finish(FinishReason::ToolCalls)),
    ];
    let (mut session, mut stream, _) =
        start(vec![first, content(&["Connecting you now."])], harness.registry);
    session.completion("I need a person", 1, Role::User, false).await;

    let reply = stream.recv().await.unwrap();
    assert_eq!(reply.event_type(), "gptreply");

    let early = tokio::time::timeout(Duration::from_millis(2_900), stream.recv()).await;
    assert!(early.is_err(), "endSession must wait for the delay");

    match stream.recv().await.unwrap() {
        SessionEvent::EndSession {
            reason_code,
            reason,
            conversation_summary,
        } => {
            assert_eq!(reason_code, "live-agent-handoff");
            assert_eq!(reason, "The caller wants to discuss a billing dispute.");
            assert!(!conversation_summary.is_empty());
        }
        other => panic!("expected endSession, got {other:?}"),
    }

    // Exactly one.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(drain(&mut stream).is_empty());
}

#[tokio::test]
async fn context_grows_across_turns_in_order() {
    let (mut session, _stream, provider) = start(
        vec![content(&["First."]), content(&["Second."])],
        CapabilityRegistry::new(),
    );
    session.completion("one", 1, Role::User, false).await;
    session.completion("two", 2, Role::User, false).await;

    let texts: Vec<&str> = session.context().messages().iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["one", "First.", "two", "Second."]);

    // The second request is built from everything committed so far.
    assert_eq!(provider.requests()[1].messages.len(), 3);
}
