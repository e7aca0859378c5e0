use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use digest_agent::ado::{AdoClient, Credentials};
use digest_agent::cli::Args;
use digest_agent::ollama::OllamaBackend;
use digest_agent::{DigestConfig, Orchestrator};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries only the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = DigestConfig::from_args(&args).context("Failed to load configuration")?;
    info!(
        ado_url = %config.ado_url,
        project = %config.project,
        ids = ?config.work_item_ids,
        model = %config.model,
        "digest starting"
    );

    let credentials =
        Credentials::resolve(config.pat.as_deref()).context("Failed to resolve ADO credentials")?;
    let source = AdoClient::new(&config.ado_url, &config.project, credentials)
        .context("Failed to build ADO client")?;

    let backend = OllamaBackend::new(&config.ollama_host, &config.model)
        .context("Failed to build Ollama client")?;
    if config.skip_model_check {
        warn!("skipping model readiness check");
    } else {
        backend
            .ensure_ready()
            .await
            .with_context(|| format!("Ollama model {} is not ready", config.model))?;
    }
    info!(available = backend.is_available().await, "AI model availability");

    let orchestrator = Orchestrator::new(source, backend, &config.pipeline);
    let report = orchestrator
        .run(&config.work_item_ids)
        .await
        .context("Digest run aborted")?;

    println!("{report}");
    std::fs::write(&config.output, &report)
        .with_context(|| format!("Failed to write {}", config.output.display()))?;
    eprintln!("\nSummaries saved to: {}", config.output.display());

    Ok(if report.trim().is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
