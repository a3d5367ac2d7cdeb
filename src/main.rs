// ABOUTME: Main entry point - runs source files through a headless playground session

use anyhow::{Context, Result};
use clap::Parser;
use playground_bridge::config::PlaygroundConfig;
use playground_bridge::sandbox::{HeadlessAgent, HeadlessRuntime};
use playground_bridge::transpile::CommandTranspiler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "playground-bridge", version, about = "Run component sources in a headless playground sandbox")]
struct Cli {
    /// Path to a config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render the sandbox document in dark mode
    #[arg(long)]
    dark: bool,

    /// Quiet period in milliseconds that counts as settled
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,

    /// Source files, submitted in order as successive edits
    #[arg(required = true)]
    sources: Vec<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PlaygroundConfig::load_from(path)?,
        None => PlaygroundConfig::load()?,
    };
    if cli.dark {
        config.sandbox.dark = true;
    }

    setup_logging(&config)?;
    setup_panic_handler();

    let transpiler = Arc::new(CommandTranspiler::from_config(&config.transpiler));
    let runtime = Box::new(HeadlessRuntime::new(config.import_map.clone()));
    let mut playground =
        playground_bridge::start(&config, transpiler, runtime, Box::new(HeadlessAgent::new()));

    for path in &cli.sources {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        info!("Submitting {}", path.display());
        playground.set_code(source);
    }

    let events = playground.settle(Duration::from_millis(cli.settle_ms)).await;
    info!("Settled after {} host events", events.len());

    let state = playground.state().clone();
    println!("{}", state.transpiled_code);
    if let Some(failure) = &state.last_failure {
        eprintln!("warning: {}", failure);
    }

    playground.shutdown().await;
    Ok(())
}

fn setup_logging(config: &PlaygroundConfig) -> Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = config.log_directory();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let log_file = log_dir.join(format!(
        "playground-bridge-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playground_bridge=info".into()),
        )
        .init();
    Ok(())
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
