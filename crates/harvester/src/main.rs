//! Harvester - profile ingestion tool

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use harvester::config::HarvestConfig;
use harvester::pipeline::Pipeline;
use harvester::sink::PostgresSink;
use harvester_common::logging::{init_logging, LogConfig, LogLevel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about = "Resumable profile ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the ingestion pipeline
    Run {
        /// Run identifier; keys the checkpoint so the run can resume
        #[arg(long)]
        run_id: String,

        /// Page to start from when no checkpoint exists
        #[arg(long)]
        start_page: Option<u64>,

        /// Page ceiling (exclusive)
        #[arg(long)]
        max_page: Option<u64>,

        /// Concurrent fetch workers per page
        #[arg(long)]
        workers: Option<usize>,

        /// Directory holding checkpoint files
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Destination database URL
        #[arg(long, env = "HARVEST_DATABASE_URL")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_level(log_level)
        .with_file_prefix("harvester");
    init_logging(&log_config)?;

    match cli.command {
        Command::Run {
            run_id,
            start_page,
            max_page,
            workers,
            checkpoint_dir,
            database_url,
        } => {
            let mut config = HarvestConfig::new(run_id).apply_env();
            if let Some(page) = start_page {
                config.start_page = page;
            }
            if let Some(page) = max_page {
                config.max_page = page;
            }
            if let Some(count) = workers {
                config.workers = count;
            }
            if let Some(dir) = checkpoint_dir {
                config.checkpoint_dir = dir;
            }

            info!(run_id = %config.run_id, "starting harvester");

            let sink = PostgresSink::connect(&database_url).await?;
            sink.ensure_schema().await?;

            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing current page");
                    ctrl_c_cancel.cancel();
                }
            });

            let pipeline = Pipeline::new(config, Arc::new(sink), cancel)?;
            let stats = pipeline.run().await?;

            info!(
                pages = stats.pages_processed,
                upserted = stats.records_upserted,
                skipped = stats.records_skipped,
                next_page = stats.next_page,
                "harvest complete"
            );
        },
    }

    Ok(())
}
