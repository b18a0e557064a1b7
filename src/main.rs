mod config;
mod core;
mod db;
mod graph;
mod ledger;
mod report;
mod tags;

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::TimeWindow;
use crate::core::trace::Tracer;
use crate::db::TagStore;
use crate::ledger::LedgerClient;
use crate::tags::{AddressTag, TagRegistry};

/// Date format accepted on the command line.
const CLI_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fixed example trace used by `--test-mode`.
const EXAMPLE_ACCOUNT: &str = "rFSFPSFUEEH7GN2H3K6nDjCQRVchuJbwpa";
const EXAMPLE_START: &str = "2023-07-15T00:00:00";
const EXAMPLE_END: &str = "2023-07-15T23:59:59";

#[derive(Parser)]
#[command(name = "flowtrace")]
#[command(about = "Trace XRP ledger flows and flag suspicious destinations")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace outgoing flows from an account or a seed transaction
    Trace(TraceArgs),

    /// Add or update an analyst tag for an address
    Tag(TagArgs),
}

#[derive(Args)]
struct TraceArgs {
    /// Starting wallet address
    #[arg(long)]
    account: Option<String>,

    /// Transaction ID to trace from instead of an account
    #[arg(long, conflicts_with = "account")]
    tx_id: Option<String>,

    /// Window start (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    start: Option<String>,

    /// Window end (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    end: Option<String>,

    /// Max recursion depth for tracing
    #[arg(long, default_value_t = 3)]
    depth: u32,

    /// Run against a fixed example account and date range
    #[arg(long)]
    test_mode: bool,
}

#[derive(Args)]
struct TagArgs {
    /// Address to tag
    #[arg(long)]
    address: String,

    /// Human-readable label
    #[arg(long)]
    label: String,

    /// Tag category (exchange, mixer, other)
    #[arg(long, default_value = "other")]
    category: String,

    /// Free-text notes
    #[arg(long, default_value = "")]
    notes: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("flowtrace=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config);

    let result = match cli.command {
        Commands::Trace(args) => run_trace(args, &config).await,
        Commands::Tag(args) => run_tag(args, &config),
    };
    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run_trace(mut args: TraceArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if args.test_mode {
        info!("Running in test mode with the example account and window");
        args.account = Some(EXAMPLE_ACCOUNT.to_string());
        args.tx_id = None;
        args.start = Some(EXAMPLE_START.to_string());
        args.end = Some(EXAMPLE_END.to_string());
    }

    let window = TimeWindow {
        start: parse_cli_datetime(args.start.as_deref())?,
        end: parse_cli_datetime(args.end.as_deref())?,
    };
    if let (Some(start), Some(end)) = (window.start, window.end) {
        if start > end {
            return Err("invalid time range: start is after end".into());
        }
    }

    let registry = load_registry(config);
    let client = LedgerClient::new(&config.api);
    let tracer = Tracer::new(&client, &registry, &config.heuristics);

    let (origin, outcome) = match (&args.account, &args.tx_id) {
        (Some(account), None) => {
            info!("Tracing from account {account}");
            let outcome = tracer.trace_account(account, window, args.depth).await?;
            (account.clone(), outcome)
        }
        (None, Some(tx_id)) => {
            info!("Tracing from transaction {tx_id}");
            let outcome = tracer.trace_transaction(tx_id, window, args.depth).await?;
            (tx_id.clone(), outcome)
        }
        _ => return Err("either --account or --tx-id is required".into()),
    };

    let graph = graph::build_graph(&outcome, &registry);
    std::fs::write(&config.output.graph_path, graph::render_dot(&graph))?;
    info!("Graph written to {}", config.output.graph_path);

    let report = report::render(&origin, window, args.depth, &outcome, &graph);
    std::fs::write(&config.output.report_path, &report)?;
    info!("Report written to {}", config.output.report_path);

    if outcome.alerts.is_empty() {
        info!("No known exchanges or suspicious destinations in the traced path");
    } else {
        info!("Summary of {} alerts:", outcome.alerts.len());
        for alert in &outcome.alerts {
            info!("{alert}");
        }
    }
    Ok(())
}

fn run_tag(args: TagArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(&config.database.path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = TagStore::open(path)?;
    let existing = store.lookup(&args.address);
    store.upsert_tag(&AddressTag {
        address: args.address.clone(),
        label: args.label,
        category: args.category,
        notes: args.notes,
    })?;
    match existing {
        Some(old) => info!("Tag for {} updated (was {:?})", args.address, old.label),
        None => info!("Tag for {} added", args.address),
    }
    Ok(())
}

/// Open the tag store and load the registry. Any failure is non-fatal: the
/// trace runs with the compiled-in exchange table only.
fn load_registry(config: &Config) -> TagRegistry {
    let path = Path::new(&config.database.path);
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create tag store directory: {e}");
            return TagRegistry::empty();
        }
    }
    match TagStore::open(path) {
        Ok(store) => TagRegistry::load(&store),
        Err(e) => {
            warn!("Tag store unavailable, tracing without analyst tags: {e}");
            TagRegistry::empty()
        }
    }
}

fn parse_cli_datetime(
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, Box<dyn std::error::Error>> {
    match value {
        Some(raw) => {
            let parsed = NaiveDateTime::parse_from_str(raw, CLI_DATE_FORMAT)
                .map_err(|e| format!("invalid date {raw:?} (expected YYYY-MM-DDTHH:MM:SS): {e}"))?;
            Ok(Some(parsed.and_utc()))
        }
        None => Ok(None),
    }
}
