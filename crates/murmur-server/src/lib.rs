pub mod config;

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use murmur_api::auth::{self, AppState, AppStateInner, CookieSettings};
use murmur_api::credentials::CredentialStore;
use murmur_api::messages::{self, MessageStore};
use murmur_api::middleware::{require_auth, session_layer};
use murmur_api::pages;
use murmur_api::session::{AuthenticatedUser, SessionStore};
use murmur_db::Database;
use murmur_gateway::connection::{self, MessageRecorder};
use murmur_gateway::hub::Hub;

use crate::config::Config;

#[derive(Clone)]
struct ServerState {
    app: AppState,
    hub: Hub,
}

/// Assemble shared state from config around an already-open database.
pub fn build_state(config: &Config, db: Arc<Database>) -> AppState {
    build_state_with(config, CredentialStore::new(db.clone()), db)
}

/// Same as `build_state` with a caller-supplied credential store, e.g. one
/// using a cheaper hash cost.
pub fn build_state_with(config: &Config, credentials: CredentialStore, db: Arc<Database>) -> AppState {
    Arc::new(AppStateInner {
        credentials,
        messages: Arc::new(MessageStore::new(db)),
        sessions: Arc::new(SessionStore::new(config.session_ttl())),
        cookies: CookieSettings {
            name: config.cookie_name.clone(),
            secure: config.cookie_secure,
        },
    })
}

/// The full HTTP + WebSocket surface.
pub fn app(state: AppState, hub: Hub) -> Router {
    let public_routes = Router::new()
        .route("/signin", get(pages::signin).post(auth::sign_in))
        .route("/newuser", get(pages::new_user).post(auth::new_user))
        .route("/signout", post(auth::sign_out))
        .route("/health", get(|| async { "ok" }))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/socket", get(ws_upgrade))
        .with_state(ServerState {
            app: state.clone(),
            hub,
        });

    let protected_routes = Router::new()
        .route("/", get(pages::index))
        .route("/api/messages", get(messages::get_messages))
        .route(
            "/api/display-name",
            get(messages::get_display_name).post(messages::set_display_name),
        )
        .with_state(state.clone())
        .merge(ws_route)
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(state, session_layer))
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Extension(user): Extension<AuthenticatedUser>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let recorder: Arc<dyn MessageRecorder> = state.app.messages.clone();
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.hub, recorder, user.username)
    })
}
