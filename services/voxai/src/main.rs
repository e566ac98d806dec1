use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::fmt::time::ChronoLocal;
use voxai_core::Event;
use voxai_core::campaign::{
    CampaignConfig, CampaignTimings, DEFAULT_RECIPIENTS, RecipientState, parse_recipients,
    run_campaign,
};
use voxai_core::gemini_responder::GeminiResponder;
use voxai_core::openai_responder::ResponderClient;
use voxai_core::orchestrator::{CallOrchestrator, CallView};
use voxai_core::ports::{SpeechOutput, UtteranceId};
use voxai_core::responder::{Responder, ScriptedResponder};
use voxai_service::config::{Config, ResponseProvider};
use voxai_service::console_input::{ConsoleCommand, ConsoleListener, HELP};
use voxai_service::console_speaker::ConsoleSpeaker;
use voxai_service::{console_view, prompt_loader};

#[derive(Parser)]
#[command(version, about = "VoxAI voice-assistant console")]
struct Cli {
    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Talk to the agent (the default)
    Call,
    /// Run a simulated outbound calling campaign
    Campaign {
        /// Comma-separated phone numbers
        #[arg(long, default_value = DEFAULT_RECIPIENTS)]
        recipients: String,
        /// Opening line spoken to each recipient
        #[arg(long)]
        script: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long)]
        agent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let cli = Cli::parse();

    // --- 2. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    // Logs go to stderr so the conversation on stdout stays readable.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting VoxAI...");

    match cli.command.unwrap_or(Mode::Call) {
        Mode::Call => run_call(&mut config).await,
        Mode::Campaign {
            recipients,
            script,
            purpose,
            agent,
        } => {
            let defaults = CampaignConfig::default();
            let campaign = CampaignConfig {
                purpose: purpose.unwrap_or(defaults.purpose),
                agent: agent.unwrap_or(defaults.agent),
                script: script.unwrap_or(defaults.script),
                recipients: parse_recipients(&recipients),
            };
            run_outbound(&config, campaign).await
        }
    }
}

fn build_responder(config: &mut Config) -> Result<Arc<dyn Responder>> {
    let prompts =
        prompt_loader::load_prompts(&config.prompts_dir).context("Failed to load LLM prompts")?;

    let responder: Arc<dyn Responder> = match config.provider {
        ResponseProvider::Gemini => {
            let key = config
                .gemini_api_key
                .take()
                .context("GEMINI_API_KEY is not set")?;
            Arc::new(GeminiResponder::new(key, config.chat_model.clone(), prompts))
        }
        ResponseProvider::OpenAI => {
            let key = config
                .openai_api_key
                .take()
                .context("OPENAI_API_KEY is not set")?;
            Arc::new(ResponderClient::new(key, config.chat_model.clone(), prompts))
        }
        ResponseProvider::Scripted => Arc::new(ScriptedResponder),
    };
    tracing::info!(
        "Using {:?} responder with model {}",
        config.provider,
        config.chat_model
    );
    Ok(responder)
}

async fn run_call(config: &mut Config) -> Result<()> {
    let responder = build_responder(config)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let listener = ConsoleListener::new(event_tx.clone(), config.listen_timeout);
    let speaker = ConsoleSpeaker::new(config.voices.clone(), config.speech_word, event_tx.clone());

    let orchestrator = CallOrchestrator::new(
        config.orchestrator_config(),
        Box::new(listener.clone()),
        Box::new(speaker),
        responder,
        event_tx.clone(),
    );
    let views = orchestrator.subscribe();
    let status_views = orchestrator.subscribe();

    println!("VoxAI console. {HELP}");

    let mut orchestrator_handle = tokio::spawn(orchestrator.run(event_rx));
    let view_handle = tokio::spawn(console_view::run(views));
    let mut input_handle = tokio::spawn(read_commands(listener, event_tx.clone(), status_views));

    tokio::select! {
        _ = &mut orchestrator_handle => {},
        result = &mut input_handle => {
            if let Ok(Err(e)) = result {
                tracing::error!("Console input failed: {:?}", e);
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }

    tracing::info!("Shutting down...");
    if event_tx.send(Event::Shutdown).is_err() {
        tracing::debug!("Orchestrator already stopped");
    }
    if tokio::time::timeout(Duration::from_secs(2), &mut orchestrator_handle)
        .await
        .is_err()
    {
        tracing::warn!("Orchestrator did not stop in time");
        orchestrator_handle.abort();
    }
    input_handle.abort();
    view_handle.abort();
    Ok(())
}

/// Routes stdin lines to the orchestrator (commands) or the recognizer (speech).
async fn read_commands(
    listener: ConsoleListener,
    events: mpsc::UnboundedSender<Event>,
    views: watch::Receiver<CallView>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };
        match command {
            ConsoleCommand::Toggle => events.send(Event::ToggleSession)?,
            ConsoleCommand::HangUp => events.send(Event::HangUp)?,
            ConsoleCommand::Status => {
                let snapshot = serde_json::to_string_pretty(&*views.borrow())?;
                println!("{snapshot}");
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => break,
            ConsoleCommand::Say(text) => {
                if !listener.deliver(&text) {
                    println!("(not listening, type /toggle to start or resume)");
                }
            }
            ConsoleCommand::Unknown(command) => {
                println!("Unknown command {command}. {HELP}");
            }
        }
    }
    Ok(())
}

async fn run_outbound(config: &Config, campaign: CampaignConfig) -> Result<()> {
    if campaign.recipients.is_empty() {
        anyhow::bail!("No recipients given");
    }

    // Synthesizer events have no orchestrator to go to here.
    let (speech_tx, mut speech_rx) = mpsc::unbounded_channel::<Event>();
    tokio::spawn(async move {
        while let Some(event) = speech_rx.recv().await {
            tracing::debug!("Campaign speech event: {:?}", event);
        }
    });
    let mut speaker = ConsoleSpeaker::new(config.voices.clone(), config.speech_word, speech_tx);

    println!(
        "Campaign '{}' as {}: {} recipient(s)",
        campaign.purpose,
        campaign.agent,
        campaign.recipients.len()
    );

    let (update_tx, mut update_rx) = mpsc::channel(64);
    let script = campaign.script.clone();
    let runner = tokio::spawn(async move {
        run_campaign(&campaign, &CampaignTimings::default(), update_tx).await
    });

    let progress = async {
        while let Some(update) = update_rx.recv().await {
            println!("{:<22} {:?}", update.phone, update.state);
            match update.state {
                RecipientState::Connected if update.index == 0 => {
                    speaker.speak(UtteranceId(1), &script, &config.default_language);
                }
                RecipientState::Completed => {
                    for line in &update.transcript {
                        println!("{:<22} {line}", "");
                    }
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = progress => {},
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, stopping campaign...");
            runner.abort();
            return Ok(());
        }
    }

    let finals = runner.await.context("Campaign task failed")?;
    println!("{}", serde_json::to_string_pretty(&finals)?);
    Ok(())
}
