//! SQLite-backed aggregate store
//!
//! One table per record kind, keyed by the record id. Each `commit` upserts
//! the five rows of a call inside a single transaction, so a failure on any
//! row rolls back the whole call.

use super::store::{AggregateBatch, AggregateStore, StoreError};
use super::types::{Actor, DailyGlobalStat, DailyResourceStat, Interaction, Resource};
use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    first_seen_ordinal INTEGER NOT NULL,
    last_seen_ordinal INTEGER NOT NULL,
    total_calls INTEGER NOT NULL,
    unique_actors INTEGER NOT NULL,
    avg_calls_per_actor REAL NOT NULL,
    is_new INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS actors (
    id TEXT PRIMARY KEY,
    resources_interacted INTEGER NOT NULL,
    total_interactions INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS interactions (
    id TEXT PRIMARY KEY,
    resource TEXT NOT NULL,
    actor TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_interactions_resource ON interactions(resource, ordinal DESC);

CREATE TABLE IF NOT EXISTS daily_resource_stats (
    id TEXT PRIMARY KEY,
    resource TEXT NOT NULL,
    day_bucket INTEGER NOT NULL,
    calls INTEGER NOT NULL,
    unique_actors INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_daily_resource_day ON daily_resource_stats(day_bucket, resource);

CREATE TABLE IF NOT EXISTS daily_global_stats (
    id TEXT PRIMARY KEY,
    day_bucket INTEGER NOT NULL,
    active_resources INTEGER NOT NULL,
    new_resources INTEGER NOT NULL,
    total_calls INTEGER NOT NULL,
    unique_actors INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

pub struct SqliteAggregateStore {
    conn: Connection,
}

/// SQLite integers are signed
fn to_sql_int(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Database(format!("value {} exceeds SQLite INTEGER range", value)))
}

/// Read a counter column; a negative value means the row is corrupt
fn get_u64(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

impl SqliteAggregateStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;
        let store = Self::with_connection(conn)?;

        log::info!("✅ SQLite aggregate store ready: {}", db_path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        let n = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| get_u64(row, 0))?;
        Ok(n)
    }

    pub fn resource_count(&self) -> Result<u64, StoreError> {
        self.count("resources")
    }

    pub fn actor_count(&self) -> Result<u64, StoreError> {
        self.count("actors")
    }

    pub fn interaction_count(&self) -> Result<u64, StoreError> {
        self.count("interactions")
    }

    /// All global daily rollups, oldest day first
    pub fn daily_global_stats(&self) -> Result<Vec<DailyGlobalStat>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, day_bucket, active_resources, new_resources, total_calls, unique_actors
             FROM daily_global_stats ORDER BY day_bucket ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DailyGlobalStat {
                id: row.get(0)?,
                day_bucket: get_u64(row, 1)?,
                active_resources: get_u64(row, 2)?,
                new_resources: get_u64(row, 3)?,
                total_calls: get_u64(row, 4)?,
                unique_actors: get_u64(row, 5)?,
            })
        })?;

        let mut stats = Vec::new();
        for stat in rows {
            stats.push(stat?);
        }
        Ok(stats)
    }
}

impl AggregateStore for SqliteAggregateStore {
    fn get_resource(&self, id: &str) -> Result<Option<Resource>, StoreError> {
        let resource = self
            .conn
            .query_row(
                "SELECT id, first_seen_ordinal, last_seen_ordinal, total_calls, unique_actors,
                        avg_calls_per_actor, is_new
                 FROM resources WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Resource {
                        id: row.get(0)?,
                        first_seen_ordinal: get_u64(row, 1)?,
                        last_seen_ordinal: get_u64(row, 2)?,
                        total_calls: get_u64(row, 3)?,
                        unique_actors: get_u64(row, 4)?,
                        avg_calls_per_actor: row.get(5)?,
                        is_new: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(resource)
    }

    fn get_actor(&self, id: &str) -> Result<Option<Actor>, StoreError> {
        let actor = self
            .conn
            .query_row(
                "SELECT id, resources_interacted, total_interactions FROM actors WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Actor {
                        id: row.get(0)?,
                        resources_interacted: get_u64(row, 1)?,
                        total_interactions: get_u64(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(actor)
    }

    fn get_interaction(&self, id: &str) -> Result<Option<Interaction>, StoreError> {
        let interaction = self
            .conn
            .query_row(
                "SELECT id, resource, actor, ordinal, timestamp FROM interactions WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Interaction {
                        id: row.get(0)?,
                        resource: row.get(1)?,
                        actor: row.get(2)?,
                        ordinal: get_u64(row, 3)?,
                        timestamp: get_u64(row, 4)?,
                    })
                },
            )
            .optional()?;
        Ok(interaction)
    }

    fn get_daily_resource_stat(&self, id: &str) -> Result<Option<DailyResourceStat>, StoreError> {
        let stat = self
            .conn
            .query_row(
                "SELECT id, resource, day_bucket, calls, unique_actors
                 FROM daily_resource_stats WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DailyResourceStat {
                        id: row.get(0)?,
                        resource: row.get(1)?,
                        day_bucket: get_u64(row, 2)?,
                        calls: get_u64(row, 3)?,
                        unique_actors: get_u64(row, 4)?,
                    })
                },
            )
            .optional()?;
        Ok(stat)
    }

    fn get_daily_global_stat(&self, id: &str) -> Result<Option<DailyGlobalStat>, StoreError> {
        let stat = self
            .conn
            .query_row(
                "SELECT id, day_bucket, active_resources, new_resources, total_calls, unique_actors
                 FROM daily_global_stats WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DailyGlobalStat {
                        id: row.get(0)?,
                        day_bucket: get_u64(row, 1)?,
                        active_resources: get_u64(row, 2)?,
                        new_resources: get_u64(row, 3)?,
                        total_calls: get_u64(row, 4)?,
                        unique_actors: get_u64(row, 5)?,
                    })
                },
            )
            .optional()?;
        Ok(stat)
    }

    fn commit(&mut self, batch: &AggregateBatch) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        // Dropped without commit on any `?` below, which rolls back
        let tx = self.conn.transaction()?;

        let r = &batch.resource;
        tx.execute(
            r#"
            INSERT INTO resources (
                id, first_seen_ordinal, last_seen_ordinal, total_calls,
                unique_actors, avg_calls_per_actor, is_new, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                first_seen_ordinal = excluded.first_seen_ordinal,
                last_seen_ordinal = excluded.last_seen_ordinal,
                total_calls = excluded.total_calls,
                unique_actors = excluded.unique_actors,
                avg_calls_per_actor = excluded.avg_calls_per_actor,
                is_new = excluded.is_new,
                updated_at = excluded.updated_at
            "#,
            params![
                r.id,
                to_sql_int(r.first_seen_ordinal)?,
                to_sql_int(r.last_seen_ordinal)?,
                to_sql_int(r.total_calls)?,
                to_sql_int(r.unique_actors)?,
                r.avg_calls_per_actor,
                r.is_new,
                now,
            ],
        )?;

        let a = &batch.actor;
        tx.execute(
            r#"
            INSERT INTO actors (id, resources_interacted, total_interactions, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                resources_interacted = excluded.resources_interacted,
                total_interactions = excluded.total_interactions,
                updated_at = excluded.updated_at
            "#,
            params![
                a.id,
                to_sql_int(a.resources_interacted)?,
                to_sql_int(a.total_interactions)?,
                now,
            ],
        )?;

        // Same id twice means a reused (resource, actor, ordinal): last write wins
        let i = &batch.interaction;
        tx.execute(
            r#"
            INSERT INTO interactions (id, resource, actor, ordinal, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                resource = excluded.resource,
                actor = excluded.actor,
                ordinal = excluded.ordinal,
                timestamp = excluded.timestamp
            "#,
            params![i.id, i.resource, i.actor, to_sql_int(i.ordinal)?, to_sql_int(i.timestamp)?],
        )?;

        let d = &batch.daily_resource;
        tx.execute(
            r#"
            INSERT INTO daily_resource_stats (id, resource, day_bucket, calls, unique_actors, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                calls = excluded.calls,
                unique_actors = excluded.unique_actors,
                updated_at = excluded.updated_at
            "#,
            params![
                d.id,
                d.resource,
                to_sql_int(d.day_bucket)?,
                to_sql_int(d.calls)?,
                to_sql_int(d.unique_actors)?,
                now,
            ],
        )?;

        let g = &batch.daily_global;
        tx.execute(
            r#"
            INSERT INTO daily_global_stats (
                id, day_bucket, active_resources, new_resources,
                total_calls, unique_actors, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                active_resources = excluded.active_resources,
                new_resources = excluded.new_resources,
                total_calls = excluded.total_calls,
                unique_actors = excluded.unique_actors,
                updated_at = excluded.updated_at
            "#,
            params![
                g.id,
                to_sql_int(g.day_bucket)?,
                to_sql_int(g.active_resources)?,
                to_sql_int(g.new_resources)?,
                to_sql_int(g.total_calls)?,
                to_sql_int(g.unique_actors)?,
                now,
            ],
        )?;

        tx.commit()?;

        log::trace!("Committed interaction {}", i.id);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
