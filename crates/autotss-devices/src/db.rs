use rusqlite::{Connection, Result};

/// Create the `autotss` table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    // devices is the user's JSON device array; enabled gates scheduled runs.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS autotss (
            user        INTEGER PRIMARY KEY NOT NULL,
            devices     TEXT NOT NULL DEFAULT '[]',
            enabled     INTEGER NOT NULL DEFAULT 1,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_autotss_enabled ON autotss (enabled);",
    )
}
