//! Shared SQLite PRAGMA tuning
//!
//! WAL journal, NORMAL sync, in-memory temp tables, checkpoint every 1000 pages.

use rusqlite::Connection;

pub const WAL_AUTOCHECKPOINT_PAGES: i64 = 1000;

pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode and wal_autocheckpoint echo the new value back as a row
    let journal_mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    let _: i64 = conn.pragma_update_and_check(
        None,
        "wal_autocheckpoint",
        WAL_AUTOCHECKPOINT_PAGES,
        |row| row.get(0),
    )?;

    log::debug!("SQLite pragmas applied (journal_mode={})", journal_mode);
    Ok(())
}
