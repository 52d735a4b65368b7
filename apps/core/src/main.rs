// Solace Entry Point
// Console chat front-end over the supervisor actor.

mod actors;
mod brain;
mod config;
mod error;
mod models;
mod preflight;
mod services;
mod telemetry;

#[cfg(test)]
mod tests;

use actors::llm::LlmActorHandle;
use actors::rag::RagActorHandle;
use actors::supervisor::{SupervisorHandle, TurnHandler, TurnPolicy, TurnServices};
use anyhow::Context;
use brain::VaderSentiment;
use config::AppConfig;
use models::{AssistantMessage, MessageKind};
use services::geolocation::IpGeolocator;
use services::notifier::SmtpNotifier;
use services::speech::{recorder_from_config, AzureSpeechTranscriber};
use services::stories::WebStorySearch;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

const QUIT_COMMAND: &str = "/quit";

#[derive(Debug, PartialEq)]
enum ConsoleInput {
    Skip,
    Quit,
    Message(String),
}

/// Blank lines and `/quit` are checked on trimmed text; anything else is sent as typed,
/// so the voice trigger only matches an exact line.
fn classify_line(line: &str) -> ConsoleInput {
    match line.trim() {
        "" => ConsoleInput::Skip,
        QUIT_COMMAND => ConsoleInput::Quit,
        _ => ConsoleInput::Message(line.to_string()),
    }
}

fn build_supervisor(config: &AppConfig) -> anyhow::Result<SupervisorHandle> {
    let llm = Arc::new(LlmActorHandle::new(&config.llm));
    let pipeline = Arc::new(RagActorHandle::new(&config.retrieval, llm));

    let services = TurnServices {
        recorder: recorder_from_config(&config.speech),
        transcriber: Arc::new(AzureSpeechTranscriber::new(&config.speech)),
        sentiment: Arc::new(VaderSentiment::new()),
        stories: Arc::new(WebStorySearch::new(&config.search)),
        geolocator: Arc::new(IpGeolocator::new(&config.geolocation)),
        notifier: Arc::new(
            SmtpNotifier::new(&config.mail).context("Invalid mail configuration")?,
        ),
    };
    let turns = TurnHandler::new(services, TurnPolicy::from_config(config));

    Ok(SupervisorHandle::new(pipeline, turns))
}

fn render(message: &AssistantMessage) -> String {
    match message.kind {
        MessageKind::Story => format!("\n{}\n", message.content),
        _ => format!("{}\n", message.content),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    telemetry::init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let report = preflight::run_preflight_checks(&config).await;
    if !report.ready_to_start {
        warn!("{}", report.summary);
    }

    let supervisor = build_supervisor(&config)?;
    let session = supervisor.start_session().await?;
    info!(session_id = %session.session_id, "Console session opened");

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(render(&session.welcome).as_bytes())
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let content = match classify_line(&line) {
            ConsoleInput::Skip => continue,
            ConsoleInput::Quit => break,
            ConsoleInput::Message(content) => content,
        };

        match supervisor
            .process_message(session.session_id.clone(), content)
            .await
        {
            Ok(outcome) => {
                for message in &outcome.messages {
                    stdout.write_all(render(message).as_bytes()).await?;
                }
            }
            Err(e) => {
                error!("Turn failed outside the session: {}", e);
                stdout
                    .write_all(format!("An error occurred: {}\n", e).as_bytes())
                    .await?;
            }
        }
    }

    if let Err(e) = supervisor.end_session(session.session_id).await {
        warn!("Failed to end session cleanly: {}", e);
    }
    supervisor.shutdown().await;
    info!("Console session closed");
    Ok(())
}
