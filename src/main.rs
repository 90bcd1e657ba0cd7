// SPDX-License-Identifier: MIT

//! Vetter CLI: fetch your social-media data and audit it for content
//! that might be inappropriate for a professional/public profile.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use vetter::audit::{classifier::GeminiClassifier, Auditor};
use vetter::config::AppConfig;
use vetter::db::{CollectionType, ContentStore};
use vetter::fetcher::TwitterFetcher;
use vetter::gemini::GeminiClient;
use vetter::report::AuditReport;
use vetter::{Result, VetterError};

/// Vetter CLI - social-media profile content auditor
#[derive(Parser, Debug)]
#[command(name = "vetter")]
#[command(version = "1.0.0")]
#[command(about = "Audit your social-media history for content risks", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "vetter.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and database status
    Status,

    /// Fetch your data from Twitter into the local store
    Fetch {
        /// Fetch your tweets (on by default)
        #[arg(long, overrides_with = "no_tweets")]
        tweets: bool,
        #[arg(long)]
        no_tweets: bool,

        /// Fetch your likes (on by default)
        #[arg(long, overrides_with = "no_likes")]
        likes: bool,
        #[arg(long)]
        no_likes: bool,

        /// Fetch your bookmarks (on by default)
        #[arg(long, overrides_with = "no_bookmarks")]
        bookmarks: bool,
        #[arg(long)]
        no_bookmarks: bool,

        /// Limit number of items fetched per collection
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Classify stored content and write an audit report
    Audit {
        /// Audit your tweets (on by default)
        #[arg(long, overrides_with = "no_tweets")]
        tweets: bool,
        #[arg(long)]
        no_tweets: bool,

        /// Audit your likes (on by default)
        #[arg(long, overrides_with = "no_likes")]
        likes: bool,
        #[arg(long)]
        no_likes: bool,

        /// Audit your bookmarks (on by default)
        #[arg(long, overrides_with = "no_bookmarks")]
        bookmarks: bool,
        #[arg(long)]
        no_bookmarks: bool,

        /// Also write a CSV export of flagged items
        #[arg(long)]
        export: Option<PathBuf>,

        /// Path for the markdown report (defaults to config value)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Items per classification request (capped at 20)
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

/// Resolve the --x/--no-x flag pair into the selected collections
fn selection(tweets: bool, no_tweets: bool, likes: bool, no_likes: bool,
             bookmarks: bool, no_bookmarks: bool) -> Vec<CollectionType> {
    let mut selected = Vec::new();
    if tweets || !no_tweets {
        selected.push(CollectionType::Post);
    }
    if likes || !no_likes {
        selected.push(CollectionType::Like);
    }
    if bookmarks || !no_bookmarks {
        selected.push(CollectionType::Bookmark);
    }
    selected
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Init { force } => run_init(&cli.config, force)?,
        Commands::Status => run_status(config)?,
        Commands::Fetch {
            tweets,
            no_tweets,
            likes,
            no_likes,
            bookmarks,
            no_bookmarks,
            limit,
        } => {
            let selected = selection(tweets, no_tweets, likes, no_likes, bookmarks, no_bookmarks);
            run_fetch(config, &selected, limit).await?;
        }
        Commands::Audit {
            tweets,
            no_tweets,
            likes,
            no_likes,
            bookmarks,
            no_bookmarks,
            export,
            output,
            batch_size,
        } => {
            let selected = selection(tweets, no_tweets, likes, no_likes, bookmarks, no_bookmarks);
            run_audit(config, &selected, export, output, batch_size).await?;
        }
    }

    Ok(())
}

/// Write a default configuration file
fn run_init(config_path: &PathBuf, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(VetterError::Config(format!(
            "{:?} already exists. Use --force to overwrite",
            config_path
        )));
    }

    AppConfig::default().save(config_path)?;
    println!("Wrote default config to {:?}", config_path);
    println!("\nNext steps:");
    println!("  1. Set TWITTER_BEARER_TOKEN and GEMINI_API_KEY (env or config file)");
    println!("  2. Run: vetter fetch");
    println!("  3. Run: vetter audit");
    Ok(())
}

/// Show configuration and store statistics
fn run_status(config: AppConfig) -> Result<()> {
    println!("Vetter status");
    println!("=============");
    println!(
        "Twitter API: {}",
        if config.twitter.bearer_token.is_some() { "configured" } else { "not configured" }
    );
    println!(
        "Gemini API:  {}",
        if config.gemini.api_key.is_some() { "configured" } else { "not configured" }
    );
    println!("Model:       {}", config.gemini.model);
    println!("Database:    {}", config.database.path);

    match ContentStore::open_existing(&config.database.path) {
        Ok(store) => {
            let stats = store.stats()?;
            println!("\nStored items:");
            println!("  Posts:     {}", stats.posts);
            println!("  Likes:     {}", stats.likes);
            println!("  Bookmarks: {}", stats.bookmarks);
        }
        Err(_) => {
            println!("\nDatabase not found. Run `vetter fetch` first.");
        }
    }

    Ok(())
}

/// Fetch selected collections into the store
async fn run_fetch(
    config: AppConfig,
    selected: &[CollectionType],
    limit: Option<usize>,
) -> Result<()> {
    let token = config.require_bearer_token()?;
    let fetcher = TwitterFetcher::new(token)?;
    let store = ContentStore::open(&config.database.path)?;

    info!("Authenticating...");
    let profile = fetcher.get_me().await?;
    info!("Authenticated as @{}", profile.username);
    store.upsert_profile(&profile)?;

    for &collection in selected {
        let items = fetcher.fetch_all(&profile.id, collection, limit).await?;
        for item in &items {
            store.upsert_item(item)?;
        }
    }

    let stats = store.stats()?;
    info!(
        "Fetch complete: {} posts, {} likes, {} bookmarks stored",
        stats.posts, stats.likes, stats.bookmarks
    );
    Ok(())
}

/// Run the audit pipeline: classify stored content, write the report
async fn run_audit(
    config: AppConfig,
    selected: &[CollectionType],
    export: Option<PathBuf>,
    output: Option<PathBuf>,
    batch_size: Option<usize>,
) -> Result<()> {
    // Missing credential is fatal before any store or network work
    let api_key = config.require_gemini_key()?;

    if selected.is_empty() {
        return Err(VetterError::Config(
            "No collection types selected for audit".to_string(),
        ));
    }

    let store = ContentStore::open_existing(&config.database.path)?;

    let client = GeminiClient::new(
        &config.gemini.base_url,
        api_key,
        &config.gemini.model,
        config.gemini.timeout_secs,
    )?;
    let classifier = GeminiClassifier::new(client, config.audit.prompt_text_cap);

    let auditor = Auditor::new(
        &store,
        &classifier,
        batch_size.unwrap_or(config.audit.batch_size),
    );
    let outcome = auditor.run(selected).await?;

    // Log every verdict for this run, but never fail the audit over it
    let run_id = uuid::Uuid::new_v4().to_string();
    if let Err(e) = store.log_verdicts(&run_id, classifier.model(), &outcome.verdicts) {
        warn!("Failed to write audit logs: {}", e);
    }

    let report = AuditReport::aggregate(&outcome);

    let report_path = output.unwrap_or_else(|| PathBuf::from(&config.audit.report_path));
    report.write_markdown(&report_path)?;
    info!("Report written to {:?}", report_path);

    if let Some(csv_path) = export {
        report.write_csv(&csv_path, config.audit.csv_text_cap)?;
        info!("CSV export written to {:?}", csv_path);
    }

    info!(
        "Audit complete: {} of {} items flagged ({} high, {} medium, {} low)",
        report.total_flagged,
        outcome.total_items,
        report.by_severity.get(&vetter::audit::Severity::High).copied().unwrap_or(0),
        report.by_severity.get(&vetter::audit::Severity::Medium).copied().unwrap_or(0),
        report.by_severity.get(&vetter::audit::Severity::Low).copied().unwrap_or(0),
    );
    if report.failed_batches > 0 {
        // Partial failures are warnings, not run failures
        warn!(
            "{} batches failed to classify; {} items not audited. Re-run the audit to cover them",
            report.failed_batches, report.unaudited_items
        );
    }

    Ok(())
}
