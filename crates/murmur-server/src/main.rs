use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use murmur_api::session::run_sweep_loop;
use murmur_gateway::hub::Hub;
use murmur_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,murmur_server=debug,murmur_api=debug,murmur_gateway=debug,murmur_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if !config.cookie_secure {
        info!("Session cookie is not marked Secure; set MURMUR_COOKIE_SECURE=true behind TLS");
    }

    // Init database
    let db = Arc::new(murmur_db::Database::open(&config.db_path)?);

    // Shared state
    let state = murmur_server::build_state(&config, db);
    let hub = Hub::new();

    // Background session sweep
    tokio::spawn(run_sweep_loop(state.sessions.clone(), config.session_sweep_secs));

    let app = murmur_server::app(state, hub);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Murmur listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
