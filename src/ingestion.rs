//! Ingestion loop - applies feed events to the aggregation engine
//!
//! Events arrive over a bounded mpsc channel and are folded one at a time.
//! The engine sits behind a single mutex, so no two `record_interaction`
//! calls ever overlap and the store sees strictly sequential
//! load-modify-commit cycles.

use crate::aggregation::{AggregateStore, AggregationEngine, InteractionEvent};
use crate::feed::{FeedError, InteractionSource};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Totals reported when the channel closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSummary {
    pub processed: u64,
    pub failed: u64,
}

/// Drain `rx` into the engine until every sender is dropped
///
/// A store failure fails only the event that hit it: it is logged, counted,
/// and the loop moves on to the next event.
pub async fn start_ingestion<S>(
    mut rx: mpsc::Receiver<InteractionEvent>,
    engine: Arc<Mutex<AggregationEngine<S>>>,
    stats_interval: Duration,
) -> IngestionSummary
where
    S: AggregateStore + Send + 'static,
{
    log::info!("🚀 Starting interaction ingestion");
    log::info!("   └─ Stats interval: {}s", stats_interval.as_secs());

    let mut summary = IngestionSummary::default();
    let mut stats_timer = interval(stats_interval);
    stats_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    stats_timer.tick().await; // Skip first immediate tick

    let mut window_count = 0u64;
    let mut window_start = Instant::now();

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else { break };

                let result = match engine.lock() {
                    Ok(mut guard) => guard.record_event(&event),
                    Err(poisoned) => poisoned.into_inner().record_event(&event),
                };

                match result {
                    Ok(()) => {
                        summary.processed += 1;
                        window_count += 1;
                    }
                    Err(e) => {
                        summary.failed += 1;
                        log::error!(
                            "❌ Failed to record {}-{}-{}: {}",
                            event.resource,
                            event.actor,
                            event.ordinal,
                            e
                        );
                    }
                }
            }

            _ = stats_timer.tick() => {
                let elapsed = window_start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    log::info!(
                        "📊 Ingestion rate: {:.1} interactions/sec (total: {}, failed: {})",
                        window_count as f64 / elapsed,
                        summary.processed,
                        summary.failed
                    );
                }
                window_count = 0;
                window_start = Instant::now();
            }
        }
    }

    log::info!(
        "✅ Ingestion finished: {} recorded, {} failed",
        summary.processed,
        summary.failed
    );
    summary
}

/// Forward events from `source` into the ingestion channel
///
/// Returns how many events were forwarded once the source is exhausted.
/// `tx` is consumed, so the channel closes on every return path, a feed
/// error included, and the ingestion loop still drains and finishes.
pub async fn pump_feed<Src>(
    source: &mut Src,
    tx: mpsc::Sender<InteractionEvent>,
) -> Result<u64, FeedError>
where
    Src: InteractionSource + ?Sized,
{
    let mut forwarded = 0u64;
    while let Some(event) = source.next_event().await? {
        if tx.send(event).await.is_err() {
            log::error!("❌ Ingestion task stopped; no longer reading feed");
            break;
        }
        forwarded += 1;
    }
    Ok(forwarded)
}
