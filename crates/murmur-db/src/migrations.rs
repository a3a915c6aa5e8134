use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Timestamps are integer microseconds since the Unix epoch (UTC), so
/// comparisons on `date_created` / `date_sent` are exact.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            username      TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            display_name  TEXT,
            date_created  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            message     TEXT NOT NULL,
            date_sent   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_date_sent
            ON messages(date_sent);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
