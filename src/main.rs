use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use watchlog_sync::{
    config::Config,
    services::{
        providers::{LetterboxdFeed, NotionStore},
        SyncOptions, SyncService, SyncSummary,
    },
};

/// Sync a Letterboxd diary into a Notion database
#[derive(Debug, Parser)]
#[command(name = "watchlog-sync", version)]
struct Cli {
    /// Compute and print the plan without writing to Notion
    #[arg(long)]
    dry_run: bool,

    /// Override the database query page size (1-100)
    #[arg(long)]
    page_size: Option<u32>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("watchlog_sync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = Config::from_env()?;
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }

    let feed = LetterboxdFeed::new(config.request_timeout(), config.max_retries)?;
    let store = NotionStore::new(
        config.notion_api_key.clone(),
        config.notion_api_url.clone(),
        config.notion_version.clone(),
        config.notion_database_id.clone(),
        config.request_timeout(),
        config.max_retries,
    )?;

    let options = SyncOptions {
        feed_url: config.feed_url(),
        page_size: config.page_size,
        dry_run: cli.dry_run,
    };

    let summary = SyncService::new(Arc::new(feed), Arc::new(store), options)
        .run()
        .await
        .context("Sync aborted")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(summary.is_success())
}

fn print_summary(summary: &SyncSummary) {
    let plan = &summary.plan;

    println!("Feed records found: {}", summary.feed_records);
    println!("Stored records found: {}", summary.stored_records);
    println!(
        "New: {}, updated: {}, unchanged: {}, skipped: {}",
        plan.to_create.len(),
        plan.to_update.len(),
        plan.unchanged,
        plan.skipped.len()
    );

    for skipped in &plan.skipped {
        println!("  skipped {:?}: {}", skipped.title, skipped.reason);
    }
    for conflict in &plan.conflicts {
        println!(
            "  conflict: external id {} is stored {} times ({})",
            conflict.external_id,
            conflict.store_ids.len(),
            conflict.store_ids.join(", ")
        );
    }

    match &summary.report {
        None => {
            println!("Dry run, nothing written");
            for record in &plan.to_create {
                println!("  would create {}", record);
            }
            for intent in &plan.to_update {
                println!("  would update {} [{}]", intent.title, intent.external_id);
            }
        }
        Some(report) if plan.is_noop() && report.is_clean() => {
            println!("Nothing to write");
        }
        Some(report) => {
            println!(
                "Created: {} (failed {}), updated: {} (failed {})",
                report.created,
                report.failed_creates(),
                report.updated,
                report.failed_updates()
            );
            for failure in &report.failures {
                println!(
                    "  failed to {} {} [{}]: {}",
                    failure.kind, failure.title, failure.external_id, failure.cause
                );
            }
        }
    }
}
