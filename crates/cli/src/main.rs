mod cli;
mod progress;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regionconv_core::{
    load_config_or_default, validate_config, CommandConverter, Config, ConversionOrchestrator,
    RunEvent, RunParams,
};

use cli::{Cli, Commands, ConvertArgs};
use progress::ProgressRenderer;

/// Exit status of a run stopped by Ctrl+C or SIGTERM.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so stdout carries only the summary
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config_or_default(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {:?}", path),
        None => "Failed to load default configuration".to_string(),
    })?;
    validate_config(&config).context("Configuration validation failed")?;

    match cli.command {
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{}", rendered);
            Ok(0)
        }
        Commands::Convert(args) => convert(config, args).await,
    }
}

async fn convert(mut config: Config, args: ConvertArgs) -> Result<i32> {
    if let Some(file) = args.log_file {
        config.logging.file = file;
    }
    if let Some(program) = args.program {
        config.converter.program = program;
    }

    let workers = args
        .workers
        .unwrap_or_else(|| config.orchestrator.worker_count());
    let params = RunParams::new(args.source, args.destination, args.mode)
        .with_compression_level(args.level)
        .with_workers(workers)
        .with_logging(args.log);

    let converter = Arc::new(CommandConverter::new(config.converter.clone()));
    let orchestrator =
        ConversionOrchestrator::new(config.orchestrator.clone(), config.logging.clone(), converter);

    info!(
        "Converting {:?} -> {:?} ({}, level {}, {} workers)",
        params.source_dir, params.destination_dir, params.mode, params.compression_level, workers
    );

    let (handle, mut events) = orchestrator
        .run_with_events(params)
        .await
        .context("Failed to start conversion")?;

    let token = handle.cancellation_token();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        if token.signal() {
            warn!("Cancelling: waiting for in-flight files to finish");
        }
    });

    let renderer = ProgressRenderer::new(!args.quiet);
    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Progress(snapshot) => renderer.update(&snapshot),
            // The summary line below replaces the terminal log line
            RunEvent::Log(line) if line.is_terminal() => {}
            RunEvent::Log(line) => renderer.line(&line.to_string()),
            RunEvent::Finished(_) => break,
        }
    }
    renderer.finish();
    signal_task.abort();

    let summary = handle.wait().await.context("Conversion run failed")?;
    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to encode summary")?;
        println!("{}", json);
    } else {
        println!("{}", summary);
    }

    if summary.failed > 0 {
        warn!("{} files failed to convert", summary.failed);
    }

    Ok(if summary.cancelled { EXIT_CANCELLED } else { 0 })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
