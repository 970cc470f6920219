//! CallFlow runtime - folds a JSONL interaction feed into aggregate statistics
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin callflow -- --backend sqlite
//! ```
//!
//! Each feed line is one interaction:
//!
//! ```json
//! {"resource":"0xabc","actor":"0xdef","ordinal":17000000,"timestamp":1700000000}
//! ```
//!
//! See `callflow::config` for the environment variables.

use callflow::aggregation::{
    AggregateStore, AggregationEngine, DailyGlobalStat, MemoryAggregateStore, SqliteAggregateStore,
};
use callflow::config::{BackendType, RuntimeConfig};
use callflow::feed::{FeedError, InteractionSource, JsonlInteractionReader};
use callflow::ingestion::{pump_feed, start_ingestion};
use std::env;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Duration;

fn day_label(day_bucket: u64) -> String {
    i64::try_from(day_bucket)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| day_bucket.to_string())
}

fn log_daily_stats(stats: &[DailyGlobalStat]) {
    log::info!("📅 Daily rollups ({} days):", stats.len());
    for stat in stats {
        log::info!(
            "   ├─ {}: calls={} active={} new={}",
            day_label(stat.day_bucket),
            stat.total_calls,
            stat.active_resources,
            stat.new_resources
        );
    }
}

/// What a run leaves behind: the store, plus the feed error that ended it early
struct RunOutcome<S> {
    store: S,
    feed_error: Option<FeedError>,
}

/// Feed -> channel -> ingestion, returning the store once the feed ends
///
/// A feed error stops reading but never skips the shutdown path: queued
/// events are still applied and the store is handed back with the error.
async fn run<S>(store: S, config: &RuntimeConfig) -> Result<RunOutcome<S>, Box<dyn std::error::Error>>
where
    S: AggregateStore + Send + 'static,
{
    log::info!("📊 Backend: {}", store.backend_type());

    let engine = Arc::new(Mutex::new(AggregationEngine::new(store)));
    let (tx, rx) = mpsc::channel(config.channel_buffer);
    let ingestion = tokio::spawn(start_ingestion(
        rx,
        engine.clone(),
        Duration::from_secs(config.stats_interval_secs),
    ));

    let mut reader = JsonlInteractionReader::new(config.events_path.clone(), config.follow);

    // Either branch drops `tx`, which lets ingestion drain what is queued and return
    let feed_error = tokio::select! {
        result = pump_feed(&mut reader, tx) => match result {
            Ok(forwarded) => {
                log::info!("📭 End of feed: {} ({} events)", config.events_path.display(), forwarded);
                None
            }
            Err(e) => {
                log::error!("❌ Feed failed, finishing queued events: {}", e);
                Some(e)
            }
        },

        _ = tokio::signal::ctrl_c() => {
            log::info!("🛑 Shutdown requested");
            None
        }
    };

    let summary = ingestion.await?;
    log::info!("   Recorded: {}, failed: {}", summary.processed, summary.failed);

    if reader.skipped() > 0 {
        log::warn!("⚠️  Skipped {} malformed feed lines", reader.skipped());
    }

    let engine = Arc::try_unwrap(engine)
        .map_err(|_| "engine still shared after ingestion finished")?
        .into_inner()
        .map_err(|_| "engine lock poisoned")?;

    Ok(RunOutcome {
        store: engine.into_store(),
        feed_error,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let mut config = RuntimeConfig::from_env()?;
    let args: Vec<String> = env::args().collect();
    config.apply_args(&args)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.rust_log.as_str()))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("🚀 Starting CallFlow");
    log::info!("   Events: {}", config.events_path.display());
    log::info!("   Follow: {}", config.follow);
    log::info!("   Channel buffer: {}", config.channel_buffer);

    match config.backend {
        BackendType::Sqlite => {
            log::info!("   Database: {}", config.db_path.display());
            let store = SqliteAggregateStore::open(&config.db_path)?;
            let RunOutcome { store, feed_error } = run(store, &config).await?;

            log::info!(
                "📦 Store totals: {} resources, {} actors, {} interactions",
                store.resource_count()?,
                store.actor_count()?,
                store.interaction_count()?
            );
            log_daily_stats(&store.daily_global_stats()?);

            if let Some(e) = feed_error {
                return Err(e.into());
            }
        }
        BackendType::Memory => {
            let store = match &config.snapshot_path {
                Some(path) => MemoryAggregateStore::load_snapshot(path)?,
                None => MemoryAggregateStore::new(),
            };
            let RunOutcome { store, feed_error } = run(store, &config).await?;

            log::info!(
                "📦 Store totals: {} resources, {} actors, {} interactions",
                store.resource_count(),
                store.actor_count(),
                store.interaction_count()
            );
            log_daily_stats(&store.daily_global_stats());

            if let Some(path) = &config.snapshot_path {
                store.save_snapshot(path)?;
                log::info!("💾 Snapshot saved: {}", path.display());
            }

            if let Some(e) = feed_error {
                return Err(e.into());
            }
        }
    }

    Ok(())
}
