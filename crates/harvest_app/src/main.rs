use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harvest_core::DateWindow;
use harvest_engine::{export_emails_csv, Pipeline, ProviderClient, SqliteStore};
use harvest_logging::{harvest_info, harvest_warn};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

use harvest_app::config::HarvestConfig;
use harvest_app::logging::{self, LogDestination};
use harvest_app::queries::read_queries;
use harvest_app::report::{self, LogSink};

#[derive(Debug, Parser)]
#[command(
    name = "harvest",
    version,
    about = "Submit search batches, collect their results and harvest email addresses"
)]
struct Cli {
    /// RON config file (defaults to ./harvest.ron when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write logs to ./harvest.log
    #[arg(long, global = true)]
    log_file: bool,

    /// Log every item as it is processed
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit the queries in a CSV file (first column, header skipped)
    Submit {
        queries: PathBuf,
        /// Queries per submission, 1 to 5
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Poll pending jobs and store finished results
    Retrieve,
    /// Scan stored results for email addresses
    Extract,
    /// List stored emails, optionally within a date range
    Emails {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// Last day (inclusive), YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
        /// Also write the list as CSV into this directory
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,
    },
}

impl Command {
    fn needs_provider(&self) -> bool {
        matches!(self, Command::Submit { .. } | Command::Retrieve)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let destination = if cli.log_file {
        LogDestination::Both
    } else {
        LogDestination::Terminal
    };
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(destination, level);

    let mut config = HarvestConfig::load(cli.config.as_deref())?;
    if let Command::Submit {
        batch_size: Some(size),
        ..
    } = &cli.command
    {
        config.batch_size = *size;
    }
    if cli.command.needs_provider() {
        config.require_api_key()?;
    }
    let settings = config.pipeline_settings()?;

    let store = SqliteStore::open(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;
    let provider = Arc::new(
        ProviderClient::new(config.provider_settings()).context("building provider client")?,
    );

    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone());

    let pipeline = Pipeline::new(Arc::new(store), provider.clone(), provider, settings)
        .with_sink(Arc::new(LogSink))
        .with_cancellation(cancel);

    match cli.command {
        Command::Submit { queries, .. } => {
            let queries = read_queries(&queries)?;
            harvest_info!("Loaded {} queries", queries.len());
            let stats = pipeline.submit_queries(&queries).await;
            println!("{}", report::submit_summary(&stats));
        }
        Command::Retrieve => {
            let stats = pipeline.retrieve_pending().await;
            println!("{}", report::retrieve_summary(&stats));
        }
        Command::Extract => {
            let stats = pipeline.extract_emails().await;
            println!("{}", report::extract_summary(&stats));
        }
        Command::Emails { start, end, export } => {
            let window = DateWindow::parse(start.as_deref(), end.as_deref())?;
            let found = pipeline.query_emails(&window).await;
            println!("{}", report::email_listing(&found));
            if let Some(dir) = export {
                let path = export_emails_csv(&dir, &window, &found.emails)
                    .with_context(|| format!("exporting emails to {}", dir.display()))?;
                println!("Exported {} emails to {}", found.total(), path.display());
            }
        }
    }
    Ok(())
}

/// Cancel `token` on Ctrl-C; the running stage stops at its next item.
fn watch_for_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            harvest_warn!("Interrupted, stopping after the current item");
            token.cancel();
        }
    });
}
