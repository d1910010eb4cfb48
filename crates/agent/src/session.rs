//! `TurnSession` — the per-session orchestrator.
//!
//! A session owns its context store, its event sink and its pending
//! handoffs. The caller drives it one turn at a time with
//! [`TurnSession::completion`] and reads replies from the [`EventStream`]
//! returned by [`TurnSession::new`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};
use voxturn_config::AppConfig;
use voxturn_core::error::TurnError;
use voxturn_core::event::{EventSink, EventStream};
use voxturn_core::message::{ContextStore, Message, Role};
use voxturn_core::profile::{PhoneNumbers, UserProfile};
use voxturn_core::provider::{Provider, ProviderRequest};
use voxturn_core::tool::CapabilityRegistry;

use crate::dispatcher::{DispatchContext, HandoffRequest, ToolDispatcher, ToolExecutionResult};
use crate::emitter::ReplyEmitter;
use crate::followup::{FollowUpController, build_payload};
use crate::handoff::{HandoffScheduler, HandoffSettings};
use crate::injection::{DefaultInjectionPolicy, InjectionPolicy, acknowledgement};
use crate::turn::{StreamOutcome, TurnDriver, TurnReport, TurnState};

/// Per-session behaviour.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub temperature: f32,

    /// The one final segment sent when a turn fails upstream.
    pub fallback_message: String,

    /// Hold back the latest fragment so the last one can be marked final.
    pub buffer_trailing_fragment: bool,

    /// Speak a short acknowledgement before running tools.
    pub announce_tools: bool,
    pub cancel_handoff_on_new_turn: bool,
    pub system_prompt: Option<String>,

    /// The tool whose call starts a live-agent handoff.
    pub handoff_function: String,
    pub handoff: HandoffSettings,

    /// Tools that get the session's phone numbers merged into their arguments.
    pub phone_number_functions: Vec<String>,
}

impl From<&AppConfig> for SessionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            fallback_message: config.turn.fallback_message.clone(),
            buffer_trailing_fragment: config.turn.buffer_trailing_fragment,
            announce_tools: config.turn.announce_tools,
            cancel_handoff_on_new_turn: config.turn.cancel_handoff_on_new_turn,
            system_prompt: config.turn.system_prompt.clone(),
            handoff_function: config.handoff.function_name.clone(),
            handoff: HandoffSettings::from(&config.handoff),
            phone_number_functions: config.augment.phone_number_functions.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// What a successful turn produced, before it is committed.
struct TurnOutput {
    reply: String,
    tool_messages: Vec<Message>,
    tool_results: Vec<ToolExecutionResult>,
}

pub struct TurnSession {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    followup: FollowUpController,
    config: SessionConfig,
    context: ContextStore,
    sink: EventSink,
    handoffs: HandoffScheduler,
    profile: Option<UserProfile>,
    phone_numbers: PhoneNumbers,
}

impl TurnSession {
    /// Create a session and the event stream its caller listens on.
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<CapabilityRegistry>,
        config: SessionConfig,
    ) -> (Self, EventStream) {
        Self::with_injection_policy(provider, registry, config, Arc::new(DefaultInjectionPolicy))
    }

    pub fn with_injection_policy(
        provider: Arc<dyn Provider>,
        registry: Arc<CapabilityRegistry>,
        config: SessionConfig,
        policy: Arc<dyn InjectionPolicy>,
    ) -> (Self, EventStream) {
        let (sink, stream) = EventSink::channel();

        let context = match &config.system_prompt {
            Some(prompt) if !prompt.trim().is_empty() => ContextStore::with_system_prompt(prompt.clone()),
            _ => ContextStore::new(),
        };

        let dispatcher = ToolDispatcher::new(
            registry,
            policy,
            config.phone_number_functions.clone(),
            config.handoff_function.clone(),
        );
        let followup = FollowUpController::new(Arc::clone(&provider), &config.model, config.temperature);
        let handoffs = HandoffScheduler::new(config.handoff.clone());

        debug!(
            session = %context.id,
            provider = provider.name(),
            model = %config.model,
            tools = dispatcher.registry().len(),
            "Session created"
        );

        let session = Self {
            provider,
            dispatcher,
            followup,
            config,
            context,
            sink,
            handoffs,
            profile: None,
            phone_numbers: PhoneNumbers::default(),
        };
        (session, stream)
    }

    /// The session's conversational log.
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Install the caller's profile. Earlier conversations, if any, are
    /// recorded as a system message.
    pub fn set_user_profile(&mut self, profile: UserProfile) {
        if let Some(history) = profile.history_prompt() {
            debug!(
                entries = profile.conversation_history.len(),
                "Adding conversation history to context"
            );
            self.context.append(Role::System, history);
        }
        self.profile = Some(profile);
    }

    pub fn user_profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn set_phone_numbers(&mut self, to: impl Into<String>, from: impl Into<String>) {
        self.phone_numbers = PhoneNumbers::new(to, from);
    }

    pub fn phone_numbers(&self) -> &PhoneNumbers {
        &self.phone_numbers
    }

    /// Handoffs scheduled and not yet fired.
    pub fn pending_handoffs(&self) -> usize {
        self.handoffs.pending()
    }

    /// Abort pending handoffs. Dropping the session does the same.
    pub fn shutdown(&mut self) {
        self.handoffs.cancel_all();
    }

    /// Run one turn for a JSON input. Anything but a string is rejected.
    pub async fn completion_json(
        &mut self,
        input: &Value,
        turn_sequence: u64,
        role: Role,
        dtmf_triggered: bool,
    ) -> TurnReport {
        match input.as_str() {
            Some(text) => self.completion(text, turn_sequence, role, dtmf_triggered).await,
            None => {
                warn!(turn = turn_sequence, input = %input, "Ignoring non-string input");
                TurnReport::rejected(
                    turn_sequence,
                    TurnError::InvalidInput("input is not a string".into()),
                )
            }
        }
    }

    /// Run one turn.
    ///
    /// Never fails: an upstream error ends the turn with the fallback message
    /// and is reported in the returned [`TurnReport`].
    pub async fn completion(
        &mut self,
        text: &str,
        turn_sequence: u64,
        role: Role,
        dtmf_triggered: bool,
    ) -> TurnReport {
        if text.is_empty() {
            warn!(turn = turn_sequence, "Ignoring empty input");
            return TurnReport::rejected(turn_sequence, TurnError::InvalidInput("input is empty".into()));
        }

        if self.config.cancel_handoff_on_new_turn {
            self.handoffs.cancel_all();
        }

        info!(turn = turn_sequence, role = %role, dtmf = dtmf_triggered, "Starting turn");
        self.context.append(role, text);

        let emitter = ReplyEmitter::new(
            self.sink.clone(),
            turn_sequence,
            self.config.buffer_trailing_fragment,
        );
        let mut driver = TurnDriver::new(emitter);
        let mut recovered = Vec::new();
        let mut handoffs = Vec::new();

        let result = self
            .run_turn(&mut driver, dtmf_triggered, &mut recovered, &mut handoffs)
            .await;

        let (reply, tool_results, error) = match result {
            Ok(output) => {
                driver.emitter.finish();
                let reply = output.reply.trim().to_string();
                self.context.extend(driver.take_staged());
                self.context.extend(output.tool_messages);
                self.context.push(Message::assistant(reply.clone()));
                (reply, output.tool_results, None)
            }
            Err(e) => {
                driver.transition(TurnState::ErrorState);
                error!(turn = turn_sequence, error = %e, "Turn failed; sending fallback");
                driver.emitter.fail(&self.config.fallback_message);
                let fallback = self.config.fallback_message.clone();
                self.context.push(Message::assistant(fallback.clone()));
                (fallback, Vec::new(), Some(e))
            }
        };
        driver.transition(TurnState::Done);

        for handoff in handoffs {
            self.schedule_handoff(handoff);
        }

        debug!(
            turn = turn_sequence,
            context_len = self.context.len(),
            segments = driver.emitter.segments_emitted(),
            "Turn complete"
        );

        TurnReport {
            turn_sequence,
            states: driver.states().to_vec(),
            reply: Some(reply),
            tool_results,
            recovered,
            error,
        }
    }

    async fn run_turn(
        &self,
        driver: &mut TurnDriver,
        dtmf_triggered: bool,
        recovered: &mut Vec<TurnError>,
        handoffs: &mut Vec<HandoffRequest>,
    ) -> Result<TurnOutput, TurnError> {
        let request = ProviderRequest::new(&self.config.model, self.context.snapshot())
            .with_temperature(self.config.temperature)
            .with_tools(self.dispatcher.registry().manifest());

        driver.transition(TurnState::Streaming);
        let rx = self.provider.stream_completion(request).await?;

        let calls = match driver.drive(rx).await? {
            StreamOutcome::Content(reply) => {
                driver.transition(TurnState::ContentTerminal);
                return Ok(TurnOutput {
                    reply,
                    tool_messages: Vec::new(),
                    tool_results: Vec::new(),
                });
            }
            StreamOutcome::ToolCalls(calls) => calls,
        };
        driver.transition(TurnState::ToolCallsTerminal);

        // Content that arrived after the last call started.
        driver.flush_content();
        recovered.extend(calls.iter().filter_map(|c| c.parse_error.clone()));

        if self.config.announce_tools && !dtmf_triggered {
            let first_name = self.profile.as_ref().and_then(UserProfile::first_name);
            for call in &calls {
                let ack = acknowledgement(&call.function_name, driver.turn_sequence(), first_name);
                driver.emitter.interject(&ack);
                driver.stage(Message::assistant(ack));
            }
        }

        driver.transition(TurnState::Dispatching);
        let outcome = self
            .dispatcher
            .dispatch(
                &calls,
                DispatchContext {
                    phone_numbers: &self.phone_numbers,
                    profile: self.profile.as_ref(),
                },
            )
            .await;

        recovered.extend(
            outcome
                .results
                .iter()
                .filter(|r| !r.success && !self.dispatcher.registry().contains(&r.function_name))
                .map(|r| TurnError::UnknownTool(r.function_name.clone())),
        );
        handoffs.extend(outcome.handoffs.iter().cloned());

        let payload = build_payload(self.context.snapshot(), driver.staged(), &outcome);

        driver.transition(TurnState::FollowupStreaming);
        let reply = self.followup.run(driver, payload).await?;
        driver.transition(TurnState::ContentTerminal);

        let mut tool_messages = vec![outcome.tool_call_message.clone()];
        tool_messages.extend(outcome.result_messages());

        Ok(TurnOutput {
            reply,
            tool_messages,
            tool_results: outcome.results,
        })
    }

    fn schedule_handoff(&mut self, request: HandoffRequest) {
        self.handoffs.schedule(
            Arc::clone(&self.provider),
            self.config.model.clone(),
            self.context.snapshot(),
            request.reason,
            self.sink.clone(),
        );
    }
}
