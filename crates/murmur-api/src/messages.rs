use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use murmur_db::Database;
use murmur_gateway::connection::MessageRecorder;
use murmur_types::api::{DisplayNameBody, HistoryEntry};

use crate::auth::AppState;
use crate::error::{ApiError, StoreError, blocking};
use crate::session::AuthenticatedUser;

/// Longest display name accepted from a client, in characters.
const MAX_DISPLAY_NAME_LEN: usize = 64;

/// Persists chat messages and replays them from the reader's join date.
pub struct MessageStore {
    db: Arc<Database>,
}

impl MessageStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a message from `username`. The send time never precedes the
    /// sender's account creation, even if the wall clock stepped back.
    pub fn add_message(&self, username: &str, body: &str) -> Result<bool, StoreError> {
        let user = self
            .db
            .get_user_by_username(username)?
            .ok_or_else(|| StoreError::UnknownUser(username.to_string()))?;

        let date_sent = Utc::now().max(user.date_created);
        let rows = self
            .db
            .insert_message(&Uuid::new_v4().to_string(), &user.id, body, date_sent)?;

        Ok(rows == 1)
    }

    /// Every message sent at or after `username` joined, oldest first.
    pub fn load_messages(&self, username: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let date_created = self
            .db
            .get_account_creation_date(username)?
            .ok_or_else(|| StoreError::UnknownUser(username.to_string()))?;

        let entries = self
            .db
            .get_messages_since(date_created)?
            .into_iter()
            .map(|row| HistoryEntry {
                display_name: row.display_name,
                username: row.username,
                body: row.message,
            })
            .collect();

        Ok(entries)
    }

    pub fn get_display_name(&self, username: &str) -> Result<Option<String>, StoreError> {
        Ok(self.db.get_display_name(username)?)
    }

    pub fn set_display_name(&self, display_name: &str, username: &str) -> Result<bool, StoreError> {
        Ok(self.db.set_display_name(display_name, username)? == 1)
    }
}

impl MessageRecorder for MessageStore {
    fn record(&self, username: &str, body: &str) -> anyhow::Result<bool> {
        Ok(self.add_message(username, body)?)
    }
}

/// GET /api/messages: history for the signed-in user.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let store = state.messages.clone();
    let history = blocking(move || store.load_messages(&user.username)).await?;
    Ok(Json(history))
}

/// GET /api/display-name
pub async fn get_display_name(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Response, ApiError> {
    let store = state.messages.clone();
    let name = blocking(move || store.get_display_name(&user.username)).await?;

    Ok(match name {
        Some(display_name) => Json(DisplayNameBody { display_name }).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

/// POST /api/display-name
pub async fn set_display_name(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<DisplayNameBody>,
) -> Result<StatusCode, ApiError> {
    let display_name = req.display_name.trim().to_string();
    if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Ok(StatusCode::BAD_REQUEST);
    }

    let store = state.messages.clone();
    let username = user.username.clone();
    let updated = blocking(move || store.set_display_name(&display_name, &username)).await?;

    if updated {
        info!("{} changed display name", user.username);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
