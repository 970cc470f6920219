//! In-process aggregate store with JSON snapshot persistence

use super::store::{AggregateBatch, AggregateStore, StoreError};
use super::types::{Actor, DailyGlobalStat, DailyResourceStat, Interaction, Resource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// HashMap-backed store, one table per record kind
///
/// `commit` only inserts into maps and cannot fail part-way.
#[derive(Debug, Default, Clone)]
pub struct MemoryAggregateStore {
    resources: HashMap<String, Resource>,
    actors: HashMap<String, Actor>,
    interactions: HashMap<String, Interaction>,
    daily_resource_stats: HashMap<String, DailyResourceStat>,
    daily_global_stats: HashMap<String, DailyGlobalStat>,
}

/// On-disk form of the whole store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub resources: Vec<Resource>,
    pub actors: Vec<Actor>,
    pub interactions: Vec<Interaction>,
    pub daily_resource_stats: Vec<DailyResourceStat>,
    pub daily_global_stats: Vec<DailyGlobalStat>,
    pub timestamp: i64,
}

impl MemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_resource(&mut self, resource: Resource) {
        self.resources.insert(resource.id.clone(), resource);
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.len()
    }

    /// All global daily rollups, oldest day first
    pub fn daily_global_stats(&self) -> Vec<DailyGlobalStat> {
        let mut stats: Vec<_> = self.daily_global_stats.values().cloned().collect();
        stats.sort_by_key(|s| s.day_bucket);
        stats
    }

    pub fn to_snapshot(&self) -> StoreSnapshot {
        // Sorted so snapshots of equal stores are byte-identical
        fn sorted<T: Clone>(table: &HashMap<String, T>) -> Vec<T> {
            let mut entries: Vec<_> = table.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            entries.into_iter().map(|(_, v)| v.clone()).collect()
        }

        StoreSnapshot {
            resources: sorted(&self.resources),
            actors: sorted(&self.actors),
            interactions: sorted(&self.interactions),
            daily_resource_stats: sorted(&self.daily_resource_stats),
            daily_global_stats: sorted(&self.daily_global_stats),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            resources: snapshot.resources.into_iter().map(|r| (r.id.clone(), r)).collect(),
            actors: snapshot.actors.into_iter().map(|a| (a.id.clone(), a)).collect(),
            interactions: snapshot.interactions.into_iter().map(|i| (i.id.clone(), i)).collect(),
            daily_resource_stats: snapshot
                .daily_resource_stats
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect(),
            daily_global_stats: snapshot
                .daily_global_stats
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect(),
        }
    }

    /// Save the whole store to a JSON file
    pub fn save_snapshot(&self, file_path: impl AsRef<Path>) -> Result<(), StoreError> {
        let file_path = file_path.as_ref();
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.to_snapshot())?;
        fs::write(file_path, json)?;

        log::debug!(
            "Saved {} resources / {} interactions to {}",
            self.resources.len(),
            self.interactions.len(),
            file_path.display()
        );
        Ok(())
    }

    /// Load a store from a JSON snapshot; a missing file yields an empty store
    pub fn load_snapshot(file_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let file_path = file_path.as_ref();
        if !file_path.exists() {
            log::info!("No existing snapshot file found: {}", file_path.display());
            return Ok(Self::new());
        }

        let json = fs::read_to_string(file_path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&json)?;
        let store = Self::from_snapshot(snapshot);

        log::info!(
            "Loaded {} resources / {} actors from {}",
            store.resources.len(),
            store.actors.len(),
            file_path.display()
        );
        Ok(store)
    }
}

impl AggregateStore for MemoryAggregateStore {
    fn get_resource(&self, id: &str) -> Result<Option<Resource>, StoreError> {
        Ok(self.resources.get(id).cloned())
    }

    fn get_actor(&self, id: &str) -> Result<Option<Actor>, StoreError> {
        Ok(self.actors.get(id).cloned())
    }

    fn get_interaction(&self, id: &str) -> Result<Option<Interaction>, StoreError> {
        Ok(self.interactions.get(id).cloned())
    }

    fn get_daily_resource_stat(&self, id: &str) -> Result<Option<DailyResourceStat>, StoreError> {
        Ok(self.daily_resource_stats.get(id).cloned())
    }

    fn get_daily_global_stat(&self, id: &str) -> Result<Option<DailyGlobalStat>, StoreError> {
        Ok(self.daily_global_stats.get(id).cloned())
    }

    fn commit(&mut self, batch: &AggregateBatch) -> Result<(), StoreError> {
        self.resources.insert(batch.resource.id.clone(), batch.resource.clone());
        self.actors.insert(batch.actor.id.clone(), batch.actor.clone());
        self.interactions
            .insert(batch.interaction.id.clone(), batch.interaction.clone());
        self.daily_resource_stats
            .insert(batch.daily_resource.id.clone(), batch.daily_resource.clone());
        self.daily_global_stats
            .insert(batch.daily_global.id.clone(), batch.daily_global.clone());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "Memory"
    }
}
