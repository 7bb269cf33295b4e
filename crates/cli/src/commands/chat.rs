//! `npcrelay chat`: single-message or interactive chat in the terminal.
//!
//! Turns go through the same scheduler the gateway uses; frames are
//! printed instead of sent over a socket.

use async_trait::async_trait;
use npcrelay_agent::{EventSink, ServerFrame, TurnInput};
use npcrelay_config::AppConfig;
use npcrelay_core::error::TransportError;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints frames to the terminal as they arrive.
pub struct StdoutSink;

impl StdoutSink {
    fn render(frame: &ServerFrame) -> String {
        match frame {
            ServerFrame::Agent { content } => prefixed("  Agent > ", content),
            ServerFrame::Tools { content } => prefixed("  Tool  > ", content),
            ServerFrame::Error { content } => format!("  [Error] {content}"),
            ServerFrame::Status { content } => format!("  [{content}]"),
            ServerFrame::Pong => "  [pong]".into(),
        }
    }
}

fn prefixed(prefix: &str, content: &str) -> String {
    content
        .lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl EventSink for StdoutSink {
    async fn send(&self, frame: ServerFrame) -> Result<(), TransportError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", Self::render(&frame)).map_err(|e| TransportError::new(e.to_string()))
    }
}

pub async fn run(config_path: Option<&Path>, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY   = 'sk-...'");
        eprintln!("    NPCRELAY_API_KEY = 'sk-...'   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let model = config.provider.model.clone();
    let wallet = format!("{:?} on {}", config.wallet.backend, config.wallet.network);
    let state = npcrelay_gateway::build_state(config).await?;
    let context = state.current_context().await;
    let session = state.registry.create_session(context.clone());
    let sink = std::sync::Arc::new(StdoutSink);

    if let Some(msg) = message {
        let report = state
            .scheduler
            .run_turn(session.id(), TurnInput::User(msg), sink)
            .await?;
        report.outcome.into_result()?;
        return Ok(());
    }

    println!();
    println!("  npcrelay: interactive mode");
    println!();
    println!("  Model:   {model}");
    println!("  Wallet:  {wallet}");
    println!("  Tools:   {}", context.tools.names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let report = state
            .scheduler
            .run_turn(session.id(), TurnInput::User(line.to_string()), sink.clone())
            .await?;
        tracing::debug!(outcome = %report.outcome, steps = report.steps, "Turn done");
        println!();
    }

    state.registry.close(session.id());
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_each_frame_type() {
        assert_eq!(
            StdoutSink::render(&ServerFrame::Agent {
                content: "hi\nthere".into()
            }),
            "  Agent > hi\n  Agent > there"
        );
        assert_eq!(
            StdoutSink::render(&ServerFrame::Tools {
                content: "Balance: 0.1".into()
            }),
            "  Tool  > Balance: 0.1"
        );
        assert_eq!(
            StdoutSink::render(&ServerFrame::error("boom")),
            "  [Error] boom"
        );
        assert_eq!(StdoutSink::render(&ServerFrame::Pong), "  [pong]");
    }
}
