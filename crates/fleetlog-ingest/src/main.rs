//! Fleetlog Ingest - exchange-log ingestion tool

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use fleetlog_common::logging::{init_logging, LogConfig, LogLevel};
use fleetlog_ingest::store::{queries, quarantine};
use fleetlog_ingest::{HostConfig, IngestConfig, Ingestor, RecordFilter};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fleetlog-ingest")]
#[command(author, version, about = "Incremental fleet exchange-log ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Fleet configuration file (TOML)
    #[arg(short, long, env = "FLEETLOG_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingestion cycle and print its summary
    Run {
        /// Only ingest these hosts (repeatable)
        #[arg(long = "host")]
        hosts: Vec<String>,
    },

    /// Show checkpoints and record counts
    Stats,

    /// List entries skipped as malformed
    Rejected {
        #[arg(long)]
        host: Option<String>,
    },

    /// Print stored records or reports over them
    Query {
        #[arg(value_enum)]
        table: Table,

        /// Required by `details`
        #[arg(long)]
        host: Option<String>,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Row limit for `recent`
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Table {
    Hosts,
    Exchanges,
    Received,
    Daily,
    /// Most recent ledger rows
    Recent,
    /// Sent files and bytes per sender and target
    Pairs,
    /// Ledger rows per hour and host
    Hourly,
    /// Ledger rows per file extension
    FileTypes,
    /// One host with its sent and received files
    Details,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("fleetlog-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let config = IngestConfig::load(cli.config.as_deref())?;
    let ingestor = Arc::new(Ingestor::from_config(&config));

    match cli.command {
        Command::Run { hosts } => run(ingestor, select_hosts(&config, &hosts)?).await?,
        Command::Stats => {
            let store = ingestor.open_store()?;
            print_json(&queries::stats(store.connection())?)?;
        },
        Command::Rejected { host } => {
            let store = ingestor.open_store()?;
            print_json(&quarantine::list(store.connection(), host.as_deref())?)?;
        },
        Command::Query {
            table,
            host,
            from,
            to,
            limit,
        } => {
            let store = ingestor.open_store()?;
            let conn = store.connection();
            let filter = RecordFilter {
                host,
                from,
                to,
            };

            match table {
                Table::Hosts => print_json(&queries::list_hosts(conn, &filter)?)?,
                Table::Exchanges => print_json(&queries::list_exchanges(conn, &filter)?)?,
                Table::Received => print_json(&queries::list_received(conn, &filter)?)?,
                Table::Daily => print_json(&queries::list_daily_activity(conn, &filter)?)?,
                Table::Recent => print_json(&queries::recent_exchanges(conn, &filter, limit)?)?,
                Table::Pairs => print_json(&queries::server_pairs(conn, &filter)?)?,
                Table::Hourly => print_json(&queries::hourly_activity(conn, &filter)?)?,
                Table::FileTypes => print_json(&queries::file_types(conn, &filter)?)?,
                Table::Details => {
                    let name = filter
                        .host
                        .as_deref()
                        .ok_or_else(|| anyhow::anyhow!("query details needs --host"))?;
                    let details = queries::host_details(conn, name)?
                        .ok_or_else(|| anyhow::anyhow!("Host '{}' has not been ingested", name))?;
                    print_json(&details)?;
                },
            }
        },
    }

    Ok(())
}

async fn run(ingestor: Arc<Ingestor>, hosts: Vec<HostConfig>) -> Result<()> {
    if hosts.is_empty() {
        warn!("No hosts configured, nothing to ingest");
    }

    let summary = tokio::task::spawn_blocking(move || ingestor.run_cycle(&hosts)).await?;
    print_json(&summary)?;

    let failed = summary.failed_hosts().count();
    if failed > 0 {
        anyhow::bail!("{} host(s) failed to ingest", failed);
    }

    info!("Ingestion complete");
    Ok(())
}

fn select_hosts(config: &IngestConfig, names: &[String]) -> Result<Vec<HostConfig>> {
    if names.is_empty() {
        return Ok(config.hosts.clone());
    }

    names
        .iter()
        .map(|name| {
            config
                .host(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Host '{}' is not in the fleet configuration", name))
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
