use serde::{Deserialize, Serialize};

// -- Auth --

/// Form body for both `POST /signin` and `POST /newuser`.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

// -- History --

/// One row of the history replay, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub display_name: String,
    pub username: String,
    pub body: String,
}

// -- Profile --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplayNameBody {
    pub display_name: String,
}
