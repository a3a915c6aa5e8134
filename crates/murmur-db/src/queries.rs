use crate::models::{HistoryRow, UserRow};
use crate::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM users WHERE username = ?1", [username], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Insert a user. Returns the number of rows written: 0 when the
    /// username is already taken.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        date_created: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "INSERT INTO users (id, username, password, date_created) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username) DO NOTHING",
                rusqlite::params![id, username, password_hash, date_created.timestamp_micros()],
            )?;
            Ok(rows)
        })
    }

    pub fn get_password_hash(&self, username: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let hash = conn
                .query_row("SELECT password FROM users WHERE username = ?1", [username], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(hash)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_account_creation_date(&self, username: &str) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| {
            let micros: Option<i64> = conn
                .query_row("SELECT date_created FROM users WHERE username = ?1", [username], |row| {
                    row.get(0)
                })
                .optional()?;
            micros.map(|m| micros_to_utc(0, m)).transpose().map_err(Into::into)
        })
    }

    /// Display name with the username as fallback. `None` if no such user.
    pub fn get_display_name(&self, username: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let name = conn
                .query_row(
                    "SELECT COALESCE(display_name, username) FROM users WHERE username = ?1",
                    [username],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(name)
        })
    }

    pub fn set_display_name(&self, display_name: &str, username: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE users SET display_name = ?1 WHERE username = ?2",
                [display_name, username],
            )?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        user_id: &str,
        message: &str,
        date_sent: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "INSERT INTO messages (id, user_id, message, date_sent) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, user_id, message, date_sent.timestamp_micros()],
            )?;
            Ok(rows)
        })
    }

    /// Every message sent at or after `since`, oldest first.
    pub fn get_messages_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoryRow>> {
        self.with_conn(|conn| query_messages_since(conn, since))
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, date_created FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                date_created: micros_to_utc(1, row.get(1)?)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages_since(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<HistoryRow>> {
    // Ties on date_sent fall back to insertion order.
    let mut stmt = conn.prepare(
        "SELECT COALESCE(u.display_name, u.username), u.username, m.message
         FROM messages m
         INNER JOIN users u ON m.user_id = u.id
         WHERE m.date_sent >= ?1
         ORDER BY m.date_sent ASC, m.rowid ASC",
    )?;

    let rows = stmt
        .query_map([since.timestamp_micros()], |row| {
            Ok(HistoryRow {
                display_name: row.get(0)?,
                username: row.get(1)?,
                message: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn micros_to_utc(column: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, micros))
}
