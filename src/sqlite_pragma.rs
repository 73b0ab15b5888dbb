//! Shared SQLite connection tuning

use rusqlite::Connection;
use std::time::Duration;

/// Apply the PRAGMAs every connection to the AIS database uses
///
/// WAL gives readers a consistent snapshot while the ingestion session
/// writes, so a committed position is visible to the following aggregation.
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // These three echo the new value back as a row
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update_and_check(None, "mmap_size", 268_435_456i64, |row| row.get::<_, i64>(0))?;
    conn.pragma_update_and_check(None, "wal_autocheckpoint", 1000i64, |row| row.get::<_, i64>(0))?;

    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -64_000i64)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}
