//! Green Agent evaluation service entry point.
//!
//! CLI argument parsing beyond `--config <path>` is out of scope; this
//! binary loads `Settings`, builds the long-lived collaborators, and
//! hosts the HTTP surface with `actix-web`, following `phoenix-web`'s
//! binary shape: fallible startup composed under `anyhow::Result`,
//! structured logging via `tracing-subscriber`.

use std::path::PathBuf;

use actix_web::{web, HttpServer};
use anyhow::Context;
use clap::Parser;
use green_config::Settings;
use green_executor::EvaluationExecutor;
use green_purple_client::PurpleAgentClient;
use green_web::handlers::AppState;

/// Default bind address for the HTTP server; not a `Settings`/`scenario.toml`
/// field since §6 documents no such key, and the single in-scope CLI flag
/// is `--config`.
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Parser, Debug)]
#[command(name = "green-agent", about = "Green Agent test-quality evaluation service")]
struct Cli {
    /// Path to the scenario.toml configuration file.
    #[arg(long, default_value = "scenario.toml")]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let settings = Settings::from_file(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;

    tracing::info!(track = %settings.track, task_count = settings.task_count, "settings loaded");

    let purple_client = PurpleAgentClient::default();
    let executor = EvaluationExecutor::new(settings, purple_client);
    let state = web::Data::new(AppState { executor });

    tracing::info!(bind = DEFAULT_BIND_ADDR, "starting Green Agent HTTP server");

    HttpServer::new(move || green_web::configure_app(state.clone()))
        .bind(DEFAULT_BIND_ADDR)
        .with_context(|| format!("failed to bind {DEFAULT_BIND_ADDR}"))?
        .run()
        .await
        .context("HTTP server exited with an error")
}
