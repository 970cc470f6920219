//! Record kinds maintained by the aggregation engine
//!
//! Every record carries its own string identity (`id`). Records never embed
//! one another; cross-references are plain key strings.

use serde::{Deserialize, Serialize};

/// One decoded interaction from the event feed
///
/// Field aliases accept the contract/wallet/block naming used by chain
/// indexers, so `{"contract": .., "wallet": .., "block_number": ..}` decodes too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    #[serde(alias = "contract")]
    pub resource: String,
    #[serde(alias = "wallet")]
    pub actor: String,
    #[serde(alias = "block_number")]
    pub ordinal: u64,
    pub timestamp: u64,
}

impl InteractionEvent {
    pub fn new(resource: impl Into<String>, actor: impl Into<String>, ordinal: u64, timestamp: u64) -> Self {
        Self {
            resource: resource.into(),
            actor: actor.into(),
            ordinal,
            timestamp,
        }
    }

    /// Parse a single JSONL line
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Lifetime counters for a target resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub first_seen_ordinal: u64,
    pub last_seen_ordinal: u64,
    pub total_calls: u64,
    pub unique_actors: u64,
    pub avg_calls_per_actor: f64,
    /// Set on creation, cleared by the first call that accounts for it
    /// in the daily global rollup
    pub is_new: bool,
}

impl Resource {
    pub fn new(id: &str, ordinal: u64) -> Self {
        Self {
            id: id.to_string(),
            first_seen_ordinal: ordinal,
            last_seen_ordinal: ordinal,
            total_calls: 0,
            unique_actors: 0,
            avg_calls_per_actor: 0.0,
            is_new: true,
        }
    }

    /// Recompute derived fields from the (already updated) counters
    ///
    /// The average is left untouched while no actor has been counted.
    pub fn recompute_average(&mut self) {
        if self.unique_actors > 0 {
            self.avg_calls_per_actor = self.total_calls as f64 / self.unique_actors as f64;
        }
    }
}

/// Lifetime counters for an actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    /// Distinct resources touched. Not maintained by the engine.
    pub resources_interacted: u64,
    pub total_interactions: u64,
}

impl Actor {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            resources_interacted: 0,
            total_interactions: 0,
        }
    }
}

/// Immutable record of a single call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub resource: String,
    pub actor: String,
    pub ordinal: u64,
    pub timestamp: u64,
}

impl Interaction {
    pub fn from_event(event: &InteractionEvent) -> Self {
        Self {
            id: interaction_id(&event.resource, &event.actor, event.ordinal),
            resource: event.resource.clone(),
            actor: event.actor.clone(),
            ordinal: event.ordinal,
            timestamp: event.timestamp,
        }
    }
}

/// Per-resource, per-day rollup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyResourceStat {
    pub id: String,
    pub resource: String,
    pub day_bucket: u64,
    pub calls: u64,
    /// Not maintained by the engine.
    pub unique_actors: u64,
}

impl DailyResourceStat {
    pub fn new(resource: &str, day_bucket: u64) -> Self {
        Self {
            id: daily_resource_stat_id(resource, day_bucket),
            resource: resource.to_string(),
            day_bucket,
            calls: 0,
            unique_actors: 0,
        }
    }
}

/// Global per-day rollup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGlobalStat {
    pub id: String,
    pub day_bucket: u64,
    pub active_resources: u64,
    pub new_resources: u64,
    pub total_calls: u64,
    /// Not maintained by the engine.
    pub unique_actors: u64,
}

impl DailyGlobalStat {
    pub fn new(day_bucket: u64) -> Self {
        Self {
            id: daily_global_stat_id(day_bucket),
            day_bucket,
            active_resources: 0,
            new_resources: 0,
            total_calls: 0,
            unique_actors: 0,
        }
    }
}

/// `resource-actor-ordinal`
pub fn interaction_id(resource: &str, actor: &str, ordinal: u64) -> String {
    format!("{}-{}-{}", resource, actor, ordinal)
}

/// `resource-day`
pub fn daily_resource_stat_id(resource: &str, day_bucket: u64) -> String {
    format!("{}-{}", resource, day_bucket)
}

pub fn daily_global_stat_id(day_bucket: u64) -> String {
    day_bucket.to_string()
}
