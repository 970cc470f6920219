//! # Interaction Aggregation
//!
//! Incrementally maintains usage statistics over a stream of interactions
//! (an actor calling a target resource at an ordinal and timestamp).
//!
//! Every interaction updates five records:
//! - `Resource` - lifetime counters and average calls per actor
//! - `Actor` - lifetime interaction count
//! - `Interaction` - immutable per-call record
//! - `DailyResourceStat` - per-resource, per-day call count
//! - `DailyGlobalStat` - per-day totals across all resources
//!
//! State is only ever read and written one record at a time through an
//! [`AggregateStore`]; there is no batch recomputation or history scan.
//!
//! ## Module Organization
//!
//! - `types` - Record kinds and the inbound `InteractionEvent`
//! - `bucket` - Day bucketing
//! - `store` - Store trait, load-or-create helper, `StoreError`
//! - `engine` - `AggregationEngine::record_interaction`
//! - `memory_store` - HashMap store with JSON snapshots
//! - `sqlite_store` - rusqlite store with transactional commits

pub mod bucket;
pub mod engine;
pub mod memory_store;
pub mod sqlite_store;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use bucket::{day_bucket, SECONDS_PER_DAY};
pub use engine::AggregationEngine;
pub use memory_store::MemoryAggregateStore;
pub use sqlite_store::SqliteAggregateStore;
pub use store::{load_or_create, AggregateBatch, AggregateStore, Loaded, Record, RecordKind, StoreError};
pub use types::{Actor, DailyGlobalStat, DailyResourceStat, Interaction, InteractionEvent, Resource};
