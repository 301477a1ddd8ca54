//! Colloquy application binary - composition root.
//!
//! Ties the Colloquy crates into a single executable:
//! 1. Parse CLI args and load configuration from TOML
//! 2. Build one shared event bus
//! 3. Construct the recognizer, bot transport, playback sink and animator
//! 4. Spawn the turn coordinator on its own task
//! 5. Feed stdin lines to the recognizer until `/quit` or Ctrl-C

mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use colloquy_bot::{EchoBrain, InMemoryBotTransport};
use colloquy_core::{ColloquyConfig, ColloquyError, ConversationEvent, EventBus};
use colloquy_speech::{
    ChannelRecognizer, ConsoleOutput, LoggingAnimator, SilentSynthesizer, SynthesizingPlayback,
};
use colloquy_turn::{Collaborators, CoordinatorHandle, NoticeKind, TurnCoordinator, TurnNotice};

use crate::cli::CliArgs;
use crate::console::{ConsoleInput, HELP};

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn report_notice(notice: &TurnNotice) {
    match &notice.kind {
        NoticeKind::StateChanged { from, to } => {
            tracing::info!(%from, %to, "Turn state");
        }
        NoticeKind::UserSaid { text } => {
            tracing::debug!(text = %text, "User turn forwarded");
        }
        NoticeKind::BotSaid { text } => {
            tracing::debug!(text = %text, "Bot turn");
        }
        NoticeKind::Error { message } => {
            eprintln!("error: {} (type /start to resume)", message);
        }
    }
}

async fn start(handle: &CoordinatorHandle) {
    match handle.start().await {
        Ok(()) => {}
        Err(ColloquyError::AlreadyStarted) => {
            println!("Conversation already running ({})", handle.state());
        }
        Err(e) => tracing::error!(error = %e, "Failed to start conversation"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = ColloquyConfig::load(&config_file);
    let config_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&args.resolve_log_level(&config_level));
    tracing::info!("Starting Colloquy v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            if config_file.exists() {
                tracing::warn!(path = %config_file.display(), error = %e, "Invalid config, using defaults");
            } else {
                tracing::info!(path = %config_file.display(), "No config file, using defaults");
            }
            ColloquyConfig::default()
        }
    };
    config.apply_env_overrides();
    config.bot.greeting = args.resolve_greeting(config.bot.greeting.as_deref());
    let reply_delay = args.resolve_reply_delay(config.bot.reply_delay_ms);
    config.validate()?;

    if !config.speech.has_credentials() {
        tracing::warn!(
            env = colloquy_core::config::SPEECH_KEY_ENV,
            "No speech subscription key configured; recognition will fail to start"
        );
    }
    tracing::debug!(has_secret = !config.bot.secret.is_empty(), "Bot transport configured");

    // Wiring.
    let bus: EventBus<ConversationEvent> = EventBus::new();
    let (speech_tx, speech_rx) = mpsc::unbounded_channel();

    let recognizer = Arc::new(ChannelRecognizer::spawn(
        config.speech.clone(),
        bus.clone(),
        speech_rx,
    ));
    let brain = match config.bot.greeting.as_deref() {
        Some(greeting) => EchoBrain::with_greeting(greeting),
        None => EchoBrain::new(),
    };
    let transport = Arc::new(
        InMemoryBotTransport::new(Arc::new(brain), bus.clone()).with_reply_delay(reply_delay),
    );
    let playback = Arc::new(SynthesizingPlayback::new(
        Arc::new(SilentSynthesizer::new(&config.synthesis)),
        Arc::new(ConsoleOutput),
        bus.clone(),
    ));

    let coordinator = TurnCoordinator::new(
        Collaborators {
            recognizer,
            transport,
            playback,
            animator: Arc::new(LoggingAnimator),
        },
        bus.clone(),
        config.bot.identity(),
        config.turn.clone(),
    );
    let handle = coordinator.spawn();
    let mut notices = handle.subscribe_notices();

    println!("{}", HELP);
    if !args.no_autostart {
        start(&handle).await;
    }

    // Console loop.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
            notice = notices.recv() => match notice {
                Some(notice) => report_notice(&notice),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::debug!("Stdin closed");
                    break;
                };
                match ConsoleInput::parse(&line) {
                    ConsoleInput::Start => start(&handle).await,
                    ConsoleInput::State => println!("state: {}", handle.state()),
                    ConsoleInput::Quit => break,
                    ConsoleInput::Speech(input) => {
                        if speech_tx.send(input).is_err() {
                            tracing::warn!("Recognizer input closed");
                        }
                    }
                    ConsoleInput::Unknown(name) => println!("unknown command /{}. {}", name, HELP),
                }
            }
        }
    }

    handle.shutdown().await?;
    bus.close();
    tracing::info!("Colloquy stopped");
    Ok(())
}
