use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use leadscout_core::AppConfig;
use leadscout_scraper::{
    AdaptiveRateLimiter, ContactEnricher, FieldExtractor, ListingProcessor, PlacesClient,
    ResultCache, ScrapeOrchestrator, ScrapeQuery, SelectorCatalog, SqliteStore,
};

mod export;

#[derive(Debug, Parser)]
#[command(name = "leadscout")]
#[command(about = "Business lead discovery and quality scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Find and rank leads for a business type in a location.
    Scrape {
        business_type: String,
        location: String,
        #[arg(long, default_value_t = 20)]
        max_results: usize,
        /// Write the ranked results to this CSV file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete expired entries from the durable cache.
    PurgeCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = leadscout_core::load_app_config_from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scrape {
            business_type,
            location,
            max_results,
            out,
        } => run_scrape(&config, business_type, location, max_results, out).await,
        Commands::PurgeCache => run_purge_cache(&config).await,
    }
}

async fn run_scrape(
    config: &AppConfig,
    business_type: String,
    location: String,
    max_results: usize,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let query = ScrapeQuery {
        business_type,
        location,
        max_results,
    };

    let outcome = orchestrator.run(&query).await?;
    let summary = &outcome.summary;

    let origin = if outcome.from_cache { " (cached)" } else { "" };
    println!(
        "{} leads for \"{}\" in \"{}\"{origin}",
        summary.total, query.business_type, query.location
    );
    for lead in &outcome.leads {
        let website = if lead.website.is_empty() {
            "-"
        } else {
            lead.website.as_str()
        };
        println!("  [{:>2}] {}  {}", lead.quality_score, lead.name, website);
    }
    println!(
        "with website: {} | with email: {} | with phone: {}",
        summary.with_website, summary.with_email, summary.with_phone
    );
    println!(
        "quality: {} high / {} medium / {} low | sources: {} scraped, {} api",
        summary.high_quality,
        summary.medium_quality,
        summary.low_quality,
        summary.scraped,
        summary.api_fallback
    );

    if let Some(path) = out {
        export::write_csv(&path, &outcome.leads)?;
        println!("wrote {} rows to {}", outcome.leads.len(), path.display());
    }

    Ok(())
}

async fn run_purge_cache(config: &AppConfig) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.cache_path).await?;
    let purged = store.purge_expired().await?;
    println!("purged {purged} expired cache entries");
    Ok(())
}

/// Wire the pipeline from configuration.
///
/// The CLI binary does not bind a browser engine; embedders supply one
/// through the library's driver traits. Runs from here are served by the
/// cache and, when an API key is configured, the fallback provider.
async fn build_orchestrator(config: &AppConfig) -> anyhow::Result<ScrapeOrchestrator> {
    let store = match SqliteStore::open(&config.cache_path).await {
        Ok(store) => Some(store),
        Err(err) => {
            tracing::warn!(error = %err, path = %config.cache_path.display(), "durable cache unavailable — running memory-only");
            None
        }
    };
    let cache = Arc::new(ResultCache::new(
        store,
        config.query_cache_ttl_secs,
        config.contact_cache_ttl_secs,
    ));

    let limiter = Arc::new(AdaptiveRateLimiter::new(
        config.requests_per_minute,
        Duration::from_millis(config.rate_base_delay_ms),
        Duration::from_millis(config.rate_max_delay_ms),
    ));
    let enricher = Arc::new(ContactEnricher::new(
        config.fetch_timeout_secs,
        config.fetch_connect_timeout_secs,
        config.max_concurrent_fetches,
        config.enrich_body_cap_bytes,
        limiter,
        &config.proxy_endpoints,
    )?);

    let places = match &config.places_api_key {
        Some(key) => Some(PlacesClient::new(
            key.clone(),
            config.fetch_timeout_secs,
            &config.user_agent,
        )?),
        None => None,
    };

    let catalog = Arc::new(SelectorCatalog::default());
    let extractor = Arc::new(FieldExtractor::new(Arc::clone(&catalog)));
    let processor = Arc::new(ListingProcessor::new(
        extractor,
        enricher,
        Arc::clone(&cache),
    ));

    Ok(ScrapeOrchestrator::new(
        None,
        catalog,
        processor,
        cache,
        places,
        config.max_concurrent_listings,
        Duration::from_millis(config.browser_timeout_ms),
    ))
}
