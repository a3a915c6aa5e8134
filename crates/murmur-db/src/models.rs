//! Database row types. These map directly to SQLite rows and are distinct
//! from the wire types in murmur-types.

use chrono::{DateTime, Utc};

/// The parts of a user row a message insert needs.
pub struct UserRow {
    pub id: String,
    pub date_created: DateTime<Utc>,
}

/// A message joined with its sender, as replayed to a reader.
#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub display_name: String,
    pub username: String,
    pub message: String,
}
