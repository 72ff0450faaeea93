//! The command-line front end of `autoassist`.

#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use autoassist::core::env_store::EnvStore;
use autoassist::core::{ControllerEvent, TurnSummary};
use autoassist::maintenance::{self, render_history};
use autoassist::{
    AppConfig, DEFAULT_CONFIG_PATH, SessionBuilder, bootstrap, env_setting,
};
use autoassist_openai_model::{OpenAIAssistantService, OpenAIConfigBuilder};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

/// Runs an assistant that works toward an objective on its own.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the assistant, one turn after another.
    Run {
        /// Stop after this many turns instead of running until interrupted.
        #[arg(long)]
        turns: Option<u64>,
    },
    /// List the assistant's responses.
    Thread,
    /// Delete the conversation, the logs and the outputs.
    Reset,
    /// Push the current configuration and tools to the assistant.
    Update,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    let mut store = EnvStore::open(&config.env_file)?;
    let service = make_service(&store)?;

    match cli.command {
        Command::Run { turns } => {
            run(service, &mut store, &config, turns).await
        }
        Command::Thread => {
            let messages = maintenance::history(&service, &store).await?;
            println!("{}", render_history(&messages));
            Ok(())
        }
        Command::Reset => {
            maintenance::reset(&service, &mut store, &config).await?;
            println!("Thread reset done.");
            Ok(())
        }
        Command::Update => {
            let dispatcher = SessionBuilder::new(&config).build_dispatcher()?;
            let tools = dispatcher.registry().descriptors();
            maintenance::update_profile(&service, &store, &config, tools)
                .await?;
            println!("Assistant updated.");
            Ok(())
        }
    }
}

fn make_service(store: &EnvStore) -> anyhow::Result<OpenAIAssistantService> {
    let Some(api_key) = env_setting(store, "OPENAI_API_KEY") else {
        bail!("OPENAI_API_KEY is set neither in the environment nor in .env");
    };
    let mut builder = OpenAIConfigBuilder::with_api_key(api_key);
    if let Some(base_url) = env_setting(store, "OPENAI_BASE_URL") {
        builder = builder.with_base_url(base_url);
    }
    Ok(OpenAIAssistantService::new(builder.build()))
}

async fn run(
    service: OpenAIAssistantService,
    store: &mut EnvStore,
    config: &AppConfig,
    turns: Option<u64>,
) -> anyhow::Result<()> {
    let session_builder = SessionBuilder::new(config);
    let dispatcher = session_builder.build_dispatcher()?;
    let tools = dispatcher.registry().descriptors();
    let session = bootstrap(&service, store, config, &tools).await?;
    info!("running in conversation {}", session.conversation_id);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut controller = session_builder
        .build_controller(service, session, dispatcher)
        .on_event(move |event| {
            event_tx.send(event.clone()).ok();
        })
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message("🤔 Thinking...");

    let run = controller.run(turns);
    tokio::pin!(run);
    let result = loop {
        select! {
            result = &mut run => break result,
            Some(event) = event_rx.recv() => report(&progress_bar, event),
            _ = sleep(Duration::from_millis(100)) => progress_bar.tick(),
        }
    };
    // Events emitted right before the run ended.
    while let Ok(event) = event_rx.try_recv() {
        report(&progress_bar, event);
    }
    progress_bar.finish_and_clear();

    result.context("the assistant stopped")?;
    Ok(())
}

fn report(progress_bar: &ProgressBar, event: ControllerEvent) {
    match event {
        ControllerEvent::TurnStarted { turn } => {
            progress_bar.set_message(format!("🤔 Turn {turn}: thinking..."));
        }
        ControllerEvent::ToolCallStarted {
            name, arguments, ..
        } => {
            progress_bar.println(format!(
                "{}🔧 {} {}",
                BAR_CHAR.bright_yellow(),
                name.bright_white().bold(),
                arguments.dimmed()
            ));
            progress_bar.set_message(format!("⏳ Running {name}..."));
        }
        ControllerEvent::ToolCallFinished {
            name,
            bytes,
            truncated,
            ..
        } => {
            if truncated {
                progress_bar.println(format!(
                    "{}✂️  Output of {name} trimmed to {bytes} bytes",
                    BAR_CHAR.bright_red()
                ));
            }
            progress_bar.set_message("🤔 Thinking...");
        }
        ControllerEvent::TurnCompleted(TurnSummary {
            turn,
            rounds,
            calls,
            output_bytes,
            ..
        }) => {
            progress_bar.println(format!(
                "{}✅ Turn {turn} completed: {calls} tool calls in {rounds} \
                 rounds, {output_bytes} bytes of output",
                BAR_CHAR.bright_cyan()
            ));
        }
        ControllerEvent::RunStarted { run_id } => {
            debug!("run {run_id} started");
        }
        ControllerEvent::OutputsSubmitted { run_id, count } => {
            debug!("submitted {count} outputs to {run_id}");
        }
    }
}
