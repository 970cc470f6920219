pub mod aggregation;
pub mod config;
pub mod feed;
pub mod ingestion;
pub mod sqlite_pragma;

pub use aggregation::{AggregateStore, AggregationEngine, InteractionEvent, StoreError};
