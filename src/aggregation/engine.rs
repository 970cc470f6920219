//! Aggregation Engine - incremental rollups over the interaction stream
//!
//! Each call folds exactly one interaction into five records:
//!
//! ```text
//! (resource, actor, ordinal, timestamp)
//!     ↓
//! Resource ── Actor ── Interaction ── DailyResourceStat ── DailyGlobalStat
//!     ↓
//! AggregateStore::commit (one unit)
//! ```
//!
//! Only read-modify-write on prior aggregate state is used; nothing is ever
//! recomputed from history.
//!
//! ## Caller contract
//!
//! - `resource` and `actor` are non-empty opaque ids. They are NOT validated;
//!   an empty id is aggregated like any other key.
//! - `(resource, actor, ordinal)` is unique per call. A repeated triple
//!   overwrites the earlier Interaction record (last write wins) while every
//!   counter still advances.
//! - Calls touching the same resource or actor must not overlap.

use super::bucket::day_bucket;
use super::store::{load_or_create, AggregateBatch, AggregateStore, Loaded, StoreError};
use super::types::{
    daily_global_stat_id, daily_resource_stat_id, Actor, DailyGlobalStat, DailyResourceStat,
    Interaction, InteractionEvent, Resource,
};

pub struct AggregationEngine<S> {
    store: S,
}

impl<S: AggregateStore> AggregationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Fold one decoded feed event into the aggregates
    pub fn record_event(&mut self, event: &InteractionEvent) -> Result<(), StoreError> {
        self.record_interaction(&event.resource, &event.actor, event.ordinal, event.timestamp)
    }

    /// Fold one interaction into all five aggregates and commit them together
    ///
    /// Any load or commit failure aborts the call; nothing from it is stored.
    pub fn record_interaction(
        &mut self,
        resource_id: &str,
        actor_id: &str,
        ordinal: u64,
        timestamp: u64,
    ) -> Result<(), StoreError> {
        // 1. Resource
        let Loaded { record: mut resource, .. } =
            load_or_create(&self.store, resource_id, || Resource::new(resource_id, ordinal))?;
        resource.last_seen_ordinal = ordinal;
        resource.total_calls += 1;

        // 2. Actor. A new actor is the only thing that bumps unique_actors.
        let Loaded { record: mut actor, created: new_actor } =
            load_or_create(&self.store, actor_id, || Actor::new(actor_id))?;
        if new_actor {
            resource.unique_actors += 1;
        }
        actor.total_interactions += 1;

        // 3. Interaction (always a fresh record)
        let interaction = Interaction::from_event(&InteractionEvent::new(
            resource_id,
            actor_id,
            ordinal,
            timestamp,
        ));

        // 4. Derived fields, after every counter above is final
        resource.recompute_average();

        // 5-6. Per-resource daily rollup
        let day = day_bucket(timestamp);
        let Loaded { record: mut daily_resource, created: first_today } = load_or_create(
            &self.store,
            &daily_resource_stat_id(resource_id, day),
            || DailyResourceStat::new(resource_id, day),
        )?;
        daily_resource.calls += 1;

        // 7. Global daily rollup
        let Loaded { record: mut daily_global, .. } =
            load_or_create(&self.store, &daily_global_stat_id(day), || DailyGlobalStat::new(day))?;
        daily_global.total_calls += 1;
        if first_today {
            daily_global.active_resources += 1;
        }

        // 8. New-resource accounting, once per resource lifetime
        if resource.is_new {
            daily_global.new_resources += 1;
            resource.is_new = false;
        }

        // 9. Persist as one unit
        self.store.commit(&AggregateBatch {
            resource,
            actor,
            interaction,
            daily_resource,
            daily_global,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::memory_store::MemoryAggregateStore;
    use crate::aggregation::types::interaction_id;

    fn engine() -> AggregationEngine<MemoryAggregateStore> {
        AggregationEngine::new(MemoryAggregateStore::new())
    }

    fn resource(engine: &AggregationEngine<MemoryAggregateStore>, id: &str) -> Resource {
        engine.store().get_resource(id).unwrap().expect("resource should exist")
    }

    fn global(engine: &AggregationEngine<MemoryAggregateStore>, day: u64) -> DailyGlobalStat {
        engine
            .store()
            .get_daily_global_stat(&daily_global_stat_id(day))
            .unwrap()
            .expect("daily global stat should exist")
    }

    #[test]
    fn test_first_event_creates_resource() {
        let mut engine = engine();
        engine.record_interaction("R", "A1", 100, 500).unwrap();

        let r = resource(&engine, "R");
        assert_eq!(r.total_calls, 1);
        assert_eq!(r.unique_actors, 1);
        assert_eq!(r.avg_calls_per_actor, 1.0);
        assert_eq!(r.first_seen_ordinal, 100);
        assert_eq!(r.last_seen_ordinal, 100);
        assert!(!r.is_new, "flag must be cleared once accounted for");
        assert_eq!(engine.store().resource_count(), 1);
    }

    #[test]
    fn test_end_to_end_two_actors() {
        let mut engine = engine();
        engine.record_interaction("R", "A1", 100, 500).unwrap();

        let a1 = engine.store().get_actor("A1").unwrap().unwrap();
        assert_eq!(a1.total_interactions, 1);
        let drs = engine
            .store()
            .get_daily_resource_stat(&daily_resource_stat_id("R", 0))
            .unwrap()
            .unwrap();
        assert_eq!(drs.day_bucket, 0);
        assert_eq!(drs.calls, 1);
        let g = global(&engine, 0);
        assert_eq!((g.total_calls, g.new_resources), (1, 1));

        engine.record_interaction("R", "A2", 101, 600).unwrap();

        let r = resource(&engine, "R");
        assert_eq!(r.total_calls, 2);
        assert_eq!(r.unique_actors, 2);
        assert_eq!(r.avg_calls_per_actor, 1.0);
        assert_eq!(r.first_seen_ordinal, 100);
        assert_eq!(r.last_seen_ordinal, 101);

        let g = global(&engine, 0);
        assert_eq!(g.total_calls, 2);
        assert_eq!(g.new_resources, 1);
    }

    #[test]
    fn test_repeat_actor_counts_once() {
        let mut engine = engine();
        for ordinal in 0..5 {
            engine.record_interaction("R", "A", ordinal, 1_000 + ordinal).unwrap();
        }

        let r = resource(&engine, "R");
        assert_eq!(r.total_calls, 5);
        assert_eq!(r.unique_actors, 1);
        assert_eq!(r.avg_calls_per_actor, 5.0);
        assert_eq!(engine.store().get_actor("A").unwrap().unwrap().total_interactions, 5);
    }

    #[test]
    fn test_distinct_actors() {
        let mut engine = engine();
        for i in 0..4u64 {
            engine.record_interaction("R", &format!("A{}", i), 10 + i, 1_000).unwrap();
        }

        let r = resource(&engine, "R");
        assert_eq!(r.total_calls, 4);
        assert_eq!(r.unique_actors, 4);
        assert_eq!(r.avg_calls_per_actor, 1.0);
    }

    #[test]
    fn test_average_is_true_division() {
        let mut engine = engine();
        engine.record_interaction("R", "A1", 1, 10).unwrap();
        engine.record_interaction("R", "A1", 2, 10).unwrap();
        engine.record_interaction("R", "A2", 3, 10).unwrap();

        assert_eq!(resource(&engine, "R").avg_calls_per_actor, 1.5);
    }

    #[test]
    fn test_known_actor_on_new_resource_is_not_unique() {
        // unique_actors is bumped only when the actor itself is first seen,
        // so an actor already known from another resource does not count.
        let mut engine = engine();
        engine.record_interaction("R1", "A", 1, 10).unwrap();
        engine.record_interaction("R2", "A", 2, 10).unwrap();

        let r2 = resource(&engine, "R2");
        assert_eq!(r2.total_calls, 1);
        assert_eq!(r2.unique_actors, 0);
        assert_eq!(r2.avg_calls_per_actor, 0.0);
    }

    #[test]
    fn test_new_resource_counted_once_across_days() {
        let mut engine = engine();
        engine.record_interaction("R", "A", 1, 100).unwrap();
        engine.record_interaction("R", "B", 2, 200).unwrap();
        engine.record_interaction("R", "A", 3, 86_400 + 5).unwrap();

        assert_eq!(global(&engine, 0).new_resources, 1);
        assert_eq!(global(&engine, 86_400).new_resources, 0);
    }

    #[test]
    fn test_day_bucketing_isolates_days() {
        let mut engine = engine();
        engine.record_interaction("R", "A", 1, 0).unwrap();
        engine.record_interaction("R", "A", 2, 86_399).unwrap();

        let before = global(&engine, 0);
        engine.record_interaction("R", "A", 3, 86_400).unwrap();

        assert_eq!(global(&engine, 0), before);
        assert_eq!(before.total_calls, 2);
        let day0 = engine
            .store()
            .get_daily_resource_stat(&daily_resource_stat_id("R", 0))
            .unwrap()
            .unwrap();
        assert_eq!(day0.calls, 2);

        let day1 = engine
            .store()
            .get_daily_resource_stat(&daily_resource_stat_id("R", 86_400))
            .unwrap()
            .unwrap();
        assert_eq!(day1.calls, 1);
        assert_eq!(day1.day_bucket, 86_400);
        assert_eq!(global(&engine, 86_400).total_calls, 1);
    }

    #[test]
    fn test_active_resources_counted_per_day() {
        let mut engine = engine();
        engine.record_interaction("R1", "A", 1, 10).unwrap();
        engine.record_interaction("R1", "B", 2, 20).unwrap();
        engine.record_interaction("R2", "A", 3, 30).unwrap();
        engine.record_interaction("R1", "A", 4, 86_400).unwrap();

        assert_eq!(global(&engine, 0).active_resources, 2);
        assert_eq!(global(&engine, 86_400).active_resources, 1);
    }

    #[test]
    fn test_distinct_counters_left_unmaintained() {
        // Actor.resources_interacted and the daily unique_actors counters are
        // not tracked by the engine; they stay at zero.
        let mut engine = engine();
        engine.record_interaction("R1", "A", 1, 10).unwrap();
        engine.record_interaction("R2", "A", 2, 10).unwrap();
        engine.record_interaction("R1", "B", 3, 10).unwrap();

        let actor = engine.store().get_actor("A").unwrap().unwrap();
        assert_eq!(actor.resources_interacted, 0);
        assert_eq!(actor.total_interactions, 2);

        let drs = engine
            .store()
            .get_daily_resource_stat(&daily_resource_stat_id("R1", 0))
            .unwrap()
            .unwrap();
        assert_eq!(drs.unique_actors, 0);
        assert_eq!(global(&engine, 0).unique_actors, 0);
    }

    #[test]
    fn test_interactions_distinct_per_ordinal() {
        let mut engine = engine();
        engine.record_interaction("R", "A", 1, 10).unwrap();
        engine.record_interaction("R", "A", 2, 20).unwrap();

        assert_eq!(engine.store().interaction_count(), 2);
        let first = engine.store().get_interaction(&interaction_id("R", "A", 1)).unwrap().unwrap();
        assert_eq!(first.timestamp, 10);
    }

    #[test]
    fn test_duplicate_triple_last_write_wins() {
        let mut engine = engine();
        engine.record_interaction("R", "A", 7, 10).unwrap();
        engine.record_interaction("R", "A", 7, 99).unwrap();

        assert_eq!(engine.store().interaction_count(), 1);
        let interaction = engine.store().get_interaction("R-A-7").unwrap().unwrap();
        assert_eq!(interaction.timestamp, 99);
        // Counters still see two calls
        assert_eq!(resource(&engine, "R").total_calls, 2);
    }

    #[test]
    fn test_empty_ids_are_not_validated() {
        // Empty ids violate the caller contract; the engine aggregates them as-is.
        let mut engine = engine();
        engine.record_interaction("", "", 0, 0).unwrap();

        assert_eq!(resource(&engine, "").total_calls, 1);
        assert!(engine.store().get_interaction("--0").unwrap().is_some());
    }
}
