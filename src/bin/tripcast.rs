//! Interactive trip planning chat on stdin.
//!
//! Reads configuration from the environment (and `.env`), then answers one
//! line at a time within a single conversation. Send an empty line to exit.
//!
//! Run with: cargo run --bin tripcast

use anyhow::Context;
use futures::stream::StreamExt;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;
use tripcast::{AppConfig, ConversationOrchestrator, TurnEvent};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let orchestrator =
        ConversationOrchestrator::from_config(&config).context("failed to set up the assistant")?;
    let conversation_id = Uuid::new_v4().to_string();

    println!("Trip planning assistant ({})", config.llm_model);
    println!("Ask about weather for your partner visits. Send an empty message to exit.\n");

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut query = String::new();
        if io::stdin().read_line(&mut query)? == 0 {
            break;
        }
        let query = query.trim();
        if query.is_empty() {
            break;
        }

        let mut events = orchestrator.stream_turn(&conversation_id, query);
        let mut answering = false;
        while let Some(event) = events.next().await {
            match event {
                TurnEvent::Working(status) => eprintln!("  ... {}", status),
                TurnEvent::Chunk(text) => {
                    if !answering {
                        print!("Assistant: ");
                        answering = true;
                    }
                    print!("{}", text);
                    io::stdout().flush()?;
                }
                TurnEvent::Completed => println!("\n"),
                TurnEvent::Failed(message) => {
                    if answering {
                        println!();
                    }
                    println!("Assistant: {}\n", message);
                }
            }
        }
    }

    orchestrator.end_conversation(&conversation_id);
    println!("\nGoodbye!");
    Ok(())
}
