//! SQLite schema and migrations for the memory store.

use rusqlite::{Connection, Result as SqliteResult, TransactionBehavior};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Apply per-connection settings.
///
/// WAL journaling with `synchronous=NORMAL` trades the durability of the most
/// recent commits on power loss for write throughput.
pub fn configure_connection(conn: &Connection) -> SqliteResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Initialize the database schema.
///
/// The version check and migrations run under one write lock, so handles
/// opening the same fresh file concurrently apply each version once.
pub fn initialize_schema(conn: &mut Connection) -> SqliteResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(&tx)?;

    if current_version < 1 {
        apply_v1_schema(&tx)?;
    }

    tx.commit()
}

/// Apply version 1 schema.
fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    // Memory nodes; `embedding` and `meta` hold JSON text
    conn.execute(
        "CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL UNIQUE,
            embedding TEXT NOT NULL,
            ts REAL NOT NULL,
            source TEXT DEFAULT NULL,
            meta TEXT DEFAULT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS edges (
            src INTEGER NOT NULL,
            dst INTEGER NOT NULL,
            rel TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 1.0,
            UNIQUE(src, dst, rel)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS experiences (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            objective TEXT NOT NULL,
            step TEXT NOT NULL,
            tool TEXT NOT NULL,
            input TEXT NOT NULL,
            output TEXT NOT NULL,
            ok INTEGER NOT NULL,
            ts REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_edges_src_rel ON edges(src, rel)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_experiences_ts ON experiences(ts)",
        [],
    )?;

    conn.execute("INSERT OR IGNORE INTO schema_version (version) VALUES (1)", [])?;

    Ok(())
}

/// Get the current schema version.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Check if the schema is initialized.
pub fn is_initialized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='nodes'",
        [],
        |row| row.get::<_, i32>(0),
    )
    .map(|count| count > 0)
    .unwrap_or(false)
}
