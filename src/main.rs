use activity_pipeline::cleaner::Cleaner;
use activity_pipeline::config::Config;
use activity_pipeline::dedup::Deduplicator;
use activity_pipeline::reclassify::Reclassifier;
use activity_pipeline::storage::{ActivityFilter, ActivityStore, SqliteStorage};
use activity_pipeline::types::{CleaningMode, RawSource};
use activity_pipeline::{importer, logging, metrics, server, summary};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "activity_pipeline")]
#[command(about = "Cleaning pipeline for scraped tour and activity listings")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a scraped JSON file into a raw import table
    Import {
        /// gyg or viator
        #[arg(long)]
        source: RawSource,
        #[arg(long)]
        file: PathBuf,
    },
    /// Remove duplicate raw rows, keeping the latest import
    Dedup {
        /// Limit to one source (default: both)
        #[arg(long)]
        source: Option<RawSource>,
    },
    /// Build cleaned activities from the raw tables
    Clean {
        /// Delete all cleaned rows before rebuilding
        #[arg(long)]
        rebuild: bool,
    },
    /// Re-resolve cities of already-cleaned activities
    Reclassify,
    /// Dedup both sources, then clean
    Run,
    /// Print per-city market statistics
    Report,
    /// Serve the market API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

async fn dedup(store: Arc<dyn ActivityStore>, sources: &[RawSource]) -> anyhow::Result<()> {
    let deduplicator = Deduplicator::new(store);
    for source in sources {
        let report = deduplicator.run(*source).await?;
        println!("\n🧹 Dedup results for {}:", report.source);
        println!("   Rows examined: {}", report.examined);
        println!("   Duplicate groups: {}", report.duplicate_groups);
        println!("   Removed: {}", report.removed);
        if report.failed_deletions > 0 {
            warn!("{} duplicate deletions failed", report.failed_deletions);
            println!("   ⚠️  Failed deletions: {}", report.failed_deletions);
        }
    }
    Ok(())
}

async fn clean(store: Arc<dyn ActivityStore>, config: &Config, mode: CleaningMode) -> anyhow::Result<()> {
    let report = Cleaner::new(store, config).run(mode).await?;
    println!("\n🔨 Cleaning results ({:?}):", report.mode);
    if report.cleared > 0 {
        println!("   Cleared before rebuild: {}", report.cleared);
    }
    for (platform, stats) in &report.platforms {
        println!(
            "   {}: {} examined, {} created, {} updated, {} unchanged, {} failed, {} pruned",
            platform,
            stats.examined,
            stats.created,
            stats.updated,
            stats.unchanged,
            stats.failed,
            stats.pruned
        );
    }
    Ok(())
}

async fn run_command(command: Commands, config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn ActivityStore> = Arc::new(
        SqliteStorage::open(&config.database.path)
            .with_context(|| format!("opening database {}", config.database.path.display()))?,
    );

    match command {
        Commands::Import { source, file } => {
            let report = importer::import_file(store.as_ref(), source, &file).await?;
            if report.already_imported {
                println!("⏭️  {} was already imported into {}", file.display(), report.source);
            } else {
                println!("📥 Imported {} listings into {}", report.inserted, report.source);
                println!("   Skipped: {}", report.skipped);
                println!("   Failed: {}", report.failed);
            }
        }
        Commands::Dedup { source } => {
            let sources = source.map(|s| vec![s]).unwrap_or_else(|| RawSource::all().to_vec());
            dedup(store, &sources).await?;
        }
        Commands::Clean { rebuild } => {
            let mode = if rebuild {
                CleaningMode::Rebuild
            } else {
                CleaningMode::Incremental
            };
            clean(store, &config, mode).await?;
        }
        Commands::Reclassify => {
            let report = Reclassifier::new(store, &config.city).run().await?;
            println!("\n🏙️  Reclassified {} of {} activities", report.changed, report.examined);
            for ((from, to), count) in &report.transitions {
                println!("   {} → {}: {}", from, to, count);
            }
            if report.failed > 0 {
                println!("   ⚠️  Failed updates: {}", report.failed);
            }
        }
        Commands::Run => {
            println!("🔄 Running full pipeline...");
            dedup(store.clone(), &RawSource::all()).await?;
            clean(store, &config, CleaningMode::Incremental).await?;
            println!("✅ Pipeline completed successfully");
        }
        Commands::Report => {
            let activities = store
                .query_cleaned_activities(&ActivityFilter::default())
                .await?;
            let market = summary::summarize(&activities);
            println!("\n📊 Market report: {} activities", market.total_activities);
            if let Some(price) = market.average_price {
                println!("   Average price: {:.2}", price);
            }
            if let Some(rating) = market.average_rating {
                println!("   Average rating: {:.2}", rating);
            }
            println!("   Total reviews: {}", market.total_reviews);
            for (city, stats) in summary::city_breakdown(&activities) {
                println!(
                    "   {:<12} {:>5} activities, avg price {}, avg rating {}, avg quality {:.1}",
                    city,
                    stats.activities,
                    stats
                        .average_price
                        .map(|p| format!("{p:.2}"))
                        .unwrap_or_else(|| "-".to_string()),
                    stats
                        .average_rating
                        .map(|r| format!("{r:.2}"))
                        .unwrap_or_else(|| "-".to_string()),
                    stats.average_quality
                );
            }
        }
        Commands::Serve { port } => {
            let mut server_config = config.server.clone();
            if let Some(port) = port {
                server_config.port = port;
            }
            server::start_server(store, &server_config).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let _guard = logging::init_logging(&config.logging);
    metrics::init_metrics();
    info!("Using database {}", config.database.path.display());

    if let Err(e) = run_command(cli.command, config).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}
