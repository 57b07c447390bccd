use std::process::ExitCode;

use anyhow::Context;

use inbox_rules::config::{EngineConfig, GmailConfig};
use inbox_rules::ingest::{IngestOptions, sync_mailbox};
use inbox_rules::pipeline::RuleEngine;
use inbox_rules::service::GmailClient;
use inbox_rules::store::LibSqlBackend;

const USAGE: &str = "usage: inbox-rules <fetch|apply>";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = std::env::args().nth(1) else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::from(2));
    };

    let config = EngineConfig::from_env().context("reading engine configuration")?;

    match command.as_str() {
        "fetch" => fetch(&config).await,
        "apply" => apply(&config).await,
        other => {
            eprintln!("Error: unknown command '{other}'");
            eprintln!("{USAGE}");
            Ok(ExitCode::from(2))
        }
    }
}

async fn open_store(config: &EngineConfig) -> anyhow::Result<LibSqlBackend> {
    LibSqlBackend::new_local(&config.db_path)
        .await
        .with_context(|| format!("opening database at {}", config.db_path.display()))
}

fn gmail_client() -> anyhow::Result<GmailClient> {
    let gmail_config = GmailConfig::from_env().context("reading Gmail configuration")?;
    Ok(GmailClient::new(&gmail_config)?)
}

async fn fetch(config: &EngineConfig) -> anyhow::Result<ExitCode> {
    let store = open_store(config).await?;
    let client = gmail_client()?;

    eprintln!("Fetching mailbox into {}", config.db_path.display());
    let report = sync_mailbox(&client, &store, IngestOptions::from(config)).await?;

    eprintln!(
        "Stored {} of {} listed messages ({} failed)",
        report.stored,
        report.listed,
        report.failed.len()
    );
    Ok(ExitCode::SUCCESS)
}

async fn apply(config: &EngineConfig) -> anyhow::Result<ExitCode> {
    let document = std::fs::read_to_string(&config.rules_path)
        .with_context(|| format!("reading rules from {}", config.rules_path.display()))?;

    let store = open_store(config).await?;
    let client = gmail_client()?;
    let engine = RuleEngine::from_config(config);

    let report = match engine.run(&document, &store, &client).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: rule document rejected");
            for error in &e.errors {
                eprintln!("  {error}");
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}
