//! `voxturn chat` — Interactive or single-message mode.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use voxturn_agent::{SessionConfig, TurnSession};
use voxturn_config::AppConfig;
use voxturn_core::event::{EventStream, SessionEvent};
use voxturn_core::message::Role;
use voxturn_core::profile::UserProfile;
use voxturn_providers::OpenAiCompatProvider;

use crate::demo_tools::demo_registry;

pub struct ChatOptions {
    pub message: Option<String>,
    pub profile: Option<PathBuf>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub dtmf: bool,
}

pub async fn run(options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    VOXTURN_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config));
    let registry = Arc::new(demo_registry());
    let tool_count = registry.len();
    let (mut session, events) = TurnSession::new(provider, registry, SessionConfig::from(&config));

    if let Some(path) = &options.profile {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read profile {}: {e}", path.display()))?;
        let profile = UserProfile::from_json(&raw)
            .map_err(|e| format!("Invalid profile {}: {e}", path.display()))?;
        session.set_user_profile(profile);
    }
    if options.to.is_some() || options.from.is_some() {
        session.set_phone_numbers(
            options.to.clone().unwrap_or_default(),
            options.from.clone().unwrap_or_default(),
        );
    }

    let (ended_tx, mut ended_rx) = oneshot::channel();
    let printer = tokio::spawn(print_events(events, ended_tx));

    if let Some(message) = options.message {
        session.completion(&message, 1, Role::User, options.dtmf).await;
        if session.pending_handoffs() > 0 {
            // Stay up until the handoff lands.
            let _ = (&mut ended_rx).await;
        }
        drop(session);
        let _ = printer.await;
        return Ok(());
    }

    println!();
    println!("  voxturn — interactive mode");
    println!();
    println!("  Endpoint:  {}", config.api_url);
    println!("  Model:     {}", config.model);
    println!("  Tools:     {tool_count} demo capabilities");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut turn_sequence: u64 = 0;

    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut ended_rx => break,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        turn_sequence += 1;
        let report = session
            .completion(line, turn_sequence, Role::User, options.dtmf)
            .await;
        tracing::debug!(
            turn = report.turn_sequence,
            states = ?report.states,
            ok = report.is_ok(),
            "Turn report"
        );
        // Give the printer a chance to flush before the next prompt.
        tokio::task::yield_now().await;
    }

    drop(session);
    let _ = printer.await;
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn print_events(mut events: EventStream, ended: oneshot::Sender<()>) {
    let mut ended = Some(ended);
    let mut line_open = false;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::GptReply(segment) => {
                if !line_open {
                    print!("  Assistant > ");
                    line_open = true;
                }
                print!("{}", segment.text);
                if segment.is_final {
                    println!();
                    line_open = false;
                }
                let _ = std::io::stdout().flush();
            }
            SessionEvent::EndSession {
                reason_code,
                reason,
                conversation_summary,
            } => {
                println!();
                println!("  [endSession] {reason_code}: {reason}");
                println!("  Summary: {conversation_summary}");
                if let Some(tx) = ended.take() {
                    let _ = tx.send(());
                }
            }
        }
    }
}
