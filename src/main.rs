//! LeadScope command-line entry point

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use leadscope::api::{self, AppState};
use leadscope::config::{config_from_env, load_config_with_hash, Config};
use leadscope::jobs::{ScanJobStore, Scheduler};
use leadscope::mail::{sender_from_config, MailDispatcher, MailQueue, VariableRenderer};
use leadscope::scanner::{analyze_bulk, HttpFetcher, LeadSearch, SiteAnalyzer};
use leadscope::sequence::{enroll_request, EnrollRequest, SequenceEngine};
use leadscope::storage::{lock_storage, open_storage, shared, ContactFilter, SharedStorage};
use leadscope::ContactStage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// LeadScope: website staleness scanner and outreach sequences
///
/// Scans business websites for signs of age, scores them as leads, and
/// runs delayed multi-step email sequences against the stored contacts.
#[derive(Parser, Debug)]
#[command(name = "leadscope")]
#[command(version = "1.0.0")]
#[command(about = "Website staleness scanner and outreach sequencer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults plus environment when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one website
    Analyze {
        url: String,
    },

    /// Analyze up to 20 websites concurrently
    Bulk {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Search for candidate business websites
    Search {
        query: String,

        #[arg(long)]
        city: Option<String>,
    },

    /// Enroll contacts into a sequence
    Enroll(EnrollArgs),

    /// Run one sequence pass, one queue drain and campaign reconciliation
    Tick,

    /// Serve the HTTP API and run the scheduler until Ctrl-C
    Serve {
        /// Overrides `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Args, Debug)]
struct EnrollArgs {
    /// Sequence ID
    #[arg(long)]
    sequence: i64,

    /// Contact IDs; when given, the filter options are ignored
    #[arg(long = "contact", conflicts_with_all = ["stage", "category", "city", "min_score"])]
    contacts: Vec<i64>,

    #[arg(long, value_parser = parse_stage)]
    stage: Option<ContactStage>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    min_score: Option<u32>,
}

fn parse_stage(value: &str) -> Result<ContactStage, String> {
    ContactStage::from_db_string(value).ok_or_else(|| {
        let known: Vec<_> = ContactStage::all_stages()
            .iter()
            .map(|stage| stage.to_db_string())
            .collect();
        format!("unknown stage '{}' (expected one of {})", value, known.join(", "))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_deref())?;

    match cli.command {
        Command::Analyze { url } => {
            let analyzer = build_analyzer(&config)?;
            print_json(&analyzer.analyze(&url).await)
        }
        Command::Bulk { urls } => {
            let analyzer = build_analyzer(&config)?;
            print_json(&analyze_bulk(&analyzer, &urls).await)
        }
        Command::Search { query, city } => {
            let search = LeadSearch::new(config.search.clone())?;
            print_json(&search.search(&query, city.as_deref()).await)
        }
        Command::Enroll(args) => handle_enroll(&config, args),
        Command::Tick => handle_tick(&config).await,
        Command::Serve { bind } => handle_serve(config, bind).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("leadscope=info,warn"),
            1 => EnvFilter::new("leadscope=debug,info"),
            2 => EnvFilter::new("leadscope=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::debug!("No configuration file given; using defaults");
            Ok(config_from_env()?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_analyzer(config: &Config) -> anyhow::Result<SiteAnalyzer> {
    let fetcher = HttpFetcher::new(&config.scanner)?;
    Ok(SiteAnalyzer::new(Arc::new(fetcher)))
}

fn open_shared_storage(config: &Config) -> anyhow::Result<SharedStorage> {
    let path = Path::new(&config.storage.database_path);
    let storage = open_storage(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(shared(storage))
}

/// Mail queue, sequence engine and scheduler wired to one storage handle
struct Outreach {
    scheduler: Scheduler,
    worker: JoinHandle<()>,
}

fn build_outreach(
    config: &Config,
    storage: &SharedStorage,
    scan_jobs: Arc<ScanJobStore>,
) -> anyhow::Result<Outreach> {
    if config.mail.api_key.is_none() {
        tracing::warn!("No mail API key configured; emails are logged, not sent");
    }
    let sender = Arc::from(sender_from_config(&config.mail)?);
    let (queue, worker) = MailQueue::start(
        MailDispatcher::new(storage.clone(), sender),
        config.scheduler.email_batch_size as usize,
    );

    let renderer = Arc::new(VariableRenderer::new(
        config.mail.sender_name.clone(),
        config.mail.sender_company.clone(),
    ));
    let engine = SequenceEngine::new(storage.clone(), renderer, queue.clone());

    let scheduler = Scheduler::new(
        storage.clone(),
        queue,
        engine,
        scan_jobs,
        config.scheduler.clone(),
    );
    Ok(Outreach { scheduler, worker })
}

fn handle_enroll(config: &Config, args: EnrollArgs) -> anyhow::Result<()> {
    let storage = open_shared_storage(config)?;

    let request = if args.contacts.is_empty() {
        EnrollRequest {
            contact_ids: None,
            filter: Some(ContactFilter {
                stage: args.stage,
                category: args.category,
                city: args.city,
                min_score: args.min_score,
            }),
        }
    } else {
        EnrollRequest {
            contact_ids: Some(args.contacts),
            filter: None,
        }
    };

    let summary = {
        let mut guard = lock_storage(&storage)?;
        enroll_request(&mut *guard, args.sequence, &request, chrono::Utc::now())?
    };
    print_json(&summary)
}

async fn handle_tick(config: &Config) -> anyhow::Result<()> {
    let storage = open_shared_storage(config)?;
    let scan_jobs = Arc::new(ScanJobStore::new(Duration::from_secs(
        config.scheduler.scan_job_ttl_secs,
    )));
    let outreach = build_outreach(config, &storage, scan_jobs)?;

    let summary = outreach.scheduler.run_once(chrono::Utc::now()).await?;
    print_json(&summary)?;

    // Closing the last queue handle lets the worker exit
    drop(outreach.scheduler);
    outreach.worker.await?;
    Ok(())
}

async fn handle_serve(config: Config, bind: Option<String>) -> anyhow::Result<()> {
    let storage = open_shared_storage(&config)?;
    let scan_jobs = Arc::new(ScanJobStore::new(Duration::from_secs(
        config.scheduler.scan_job_ttl_secs,
    )));
    let outreach = build_outreach(&config, &storage, scan_jobs.clone())?;

    let state = AppState {
        storage,
        analyzer: build_analyzer(&config)?,
        search: Arc::new(LeadSearch::new(config.search.clone())?),
        scan_jobs,
    };

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!("Listening on {}", bind);

    let scheduler = outreach.scheduler.start();

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;

    scheduler.shutdown().await;
    Ok(())
}
