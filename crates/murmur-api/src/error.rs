use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Failures from the credential and message stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The user row a session points at no longer exists.
    #[error("no user named {0:?}")]
    UnknownUser(String),

    #[error("stored password hash is unreadable: {0}")]
    CorruptHash(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Errors that escape a request handler. Authentication failures never get
/// here: they are answered with a redirect back to the form.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// Run a store call on the blocking pool. SQLite and Argon2 both block.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
