//! Aggregate store abstraction
//!
//! The engine only needs two things from persistence:
//! - get-by-id for each of the five record kinds (absent -> `None`)
//! - one `commit` that upserts all five records of a call as a unit
//!
//! Implementations that cannot make `commit` all-or-nothing must say so;
//! both stores in this crate can.
//!
//! Concurrency: load-modify-commit is not atomic across calls. Callers must
//! serialize `record_interaction` per resource and per actor (the ingestion
//! loop serializes everything behind one lock).

use super::types::{Actor, DailyGlobalStat, DailyResourceStat, Interaction, Resource};

#[derive(Debug)]
pub enum StoreError {
    Database(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::Unavailable(e) => write!(f, "Store unavailable: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Resource,
    Actor,
    Interaction,
    DailyResourceStat,
    DailyGlobalStat,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Resource => "resource",
            RecordKind::Actor => "actor",
            RecordKind::Interaction => "interaction",
            RecordKind::DailyResourceStat => "daily_resource_stat",
            RecordKind::DailyGlobalStat => "daily_global_stat",
        }
    }
}

/// Everything one `record_interaction` call writes
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateBatch {
    pub resource: Resource,
    pub actor: Actor,
    pub interaction: Interaction,
    pub daily_resource: DailyResourceStat,
    pub daily_global: DailyGlobalStat,
}

/// Backend holding the five record kinds
pub trait AggregateStore {
    fn get_resource(&self, id: &str) -> Result<Option<Resource>, StoreError>;

    fn get_actor(&self, id: &str) -> Result<Option<Actor>, StoreError>;

    fn get_interaction(&self, id: &str) -> Result<Option<Interaction>, StoreError>;

    fn get_daily_resource_stat(&self, id: &str) -> Result<Option<DailyResourceStat>, StoreError>;

    fn get_daily_global_stat(&self, id: &str) -> Result<Option<DailyGlobalStat>, StoreError>;

    /// Upsert all five records atomically
    ///
    /// On `Err`, none of the batch may be visible to later reads.
    fn commit(&mut self, batch: &AggregateBatch) -> Result<(), StoreError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// A record kind the store can look up by id
pub trait Record: Sized {
    const KIND: RecordKind;

    fn id(&self) -> &str;

    fn fetch<S: AggregateStore + ?Sized>(store: &S, id: &str) -> Result<Option<Self>, StoreError>;
}

impl Record for Resource {
    const KIND: RecordKind = RecordKind::Resource;

    fn id(&self) -> &str {
        &self.id
    }

    fn fetch<S: AggregateStore + ?Sized>(store: &S, id: &str) -> Result<Option<Self>, StoreError> {
        store.get_resource(id)
    }
}

impl Record for Actor {
    const KIND: RecordKind = RecordKind::Actor;

    fn id(&self) -> &str {
        &self.id
    }

    fn fetch<S: AggregateStore + ?Sized>(store: &S, id: &str) -> Result<Option<Self>, StoreError> {
        store.get_actor(id)
    }
}

impl Record for Interaction {
    const KIND: RecordKind = RecordKind::Interaction;

    fn id(&self) -> &str {
        &self.id
    }

    fn fetch<S: AggregateStore + ?Sized>(store: &S, id: &str) -> Result<Option<Self>, StoreError> {
        store.get_interaction(id)
    }
}

impl Record for DailyResourceStat {
    const KIND: RecordKind = RecordKind::DailyResourceStat;

    fn id(&self) -> &str {
        &self.id
    }

    fn fetch<S: AggregateStore + ?Sized>(store: &S, id: &str) -> Result<Option<Self>, StoreError> {
        store.get_daily_resource_stat(id)
    }
}

impl Record for DailyGlobalStat {
    const KIND: RecordKind = RecordKind::DailyGlobalStat;

    fn id(&self) -> &str {
        &self.id
    }

    fn fetch<S: AggregateStore + ?Sized>(store: &S, id: &str) -> Result<Option<Self>, StoreError> {
        store.get_daily_global_stat(id)
    }
}

/// A record obtained through [`load_or_create`]
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<R> {
    pub record: R,
    /// True when the record did not exist in the store
    pub created: bool,
}

/// Load a record by id, or build a fresh one when absent
///
/// The single create-if-absent path shared by every record kind.
pub fn load_or_create<R, S, F>(store: &S, id: &str, create: F) -> Result<Loaded<R>, StoreError>
where
    R: Record,
    S: AggregateStore + ?Sized,
    F: FnOnce() -> R,
{
    match R::fetch(store, id)? {
        Some(record) => Ok(Loaded { record, created: false }),
        None => {
            let record = create();
            debug_assert_eq!(record.id(), id, "created {} has mismatched id", R::KIND.as_str());
            Ok(Loaded { record, created: true })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::memory_store::MemoryAggregateStore;

    #[test]
    fn test_load_or_create_absent_builds_fresh() {
        let store = MemoryAggregateStore::new();

        let loaded: Loaded<Actor> = load_or_create(&store, "A1", || Actor::new("A1")).unwrap();

        assert!(loaded.created);
        assert_eq!(loaded.record, Actor::new("A1"));
    }

    #[test]
    fn test_load_or_create_present_skips_factory() {
        let mut store = MemoryAggregateStore::new();
        let mut resource = Resource::new("R", 7);
        resource.total_calls = 4;
        store.insert_resource(resource.clone());

        let loaded: Loaded<Resource> =
            load_or_create(&store, "R", || panic!("factory must not run")).unwrap();

        assert!(!loaded.created);
        assert_eq!(loaded.record, resource);
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable("connection dropped".to_string());
        assert_eq!(err.to_string(), "Store unavailable: connection dropped");
    }
}
