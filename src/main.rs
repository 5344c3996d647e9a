//! Medical Record Backend
//! Mission: Keep caregivers' patient records behind authenticated HTTP endpoints

use anyhow::{Context, Result};
use axum::middleware;
use clap::Parser;
use dotenv::dotenv;
use std::{path::Path, sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::interval};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medrecord_backend::{
    api::{create_router, AppState},
    auth::{AuthState, JwtHandler, SessionStore, UserStore},
    config::Config,
    db::Database,
    middleware::request_logging,
    records::RecordStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = Config::parse();

    info!("🚀 Medical record backend starting");
    if config.uses_dev_secrets() {
        warn!("⚠️  Using built-in development token secrets; set ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET");
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    info!("💾 Database ready at {}", config.database_path);

    let user_store = Arc::new(UserStore::new(db.clone(), config.effective_bcrypt_cost()));
    let record_store = Arc::new(RecordStore::new(db));
    let jwt_handler = Arc::new(
        JwtHandler::new(
            config.access_token_secret.clone(),
            config.refresh_token_secret.clone(),
        )
        .with_ttls(config.access_token_ttl_secs, config.refresh_token_ttl_secs),
    );
    let sessions = Arc::new(SessionStore::new());

    spawn_session_pruning(sessions.clone(), config.session_prune_secs);

    let auth_state = AuthState::new(user_store.clone(), jwt_handler, sessions);
    let app_state = AppState::new(record_store, user_store, config.profile_count_scope);

    let prefix = config.normalized_prefix();
    let app = create_router(auth_state, app_state, &prefix)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 API server listening on {} (prefix: {:?})", addr, prefix);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Periodically drop refresh sessions whose tokens have expired
fn spawn_session_pruning(sessions: Arc<SessionStore>, every_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(every_secs.max(1)));
        loop {
            ticker.tick().await;
            let removed = sessions.prune();
            if removed > 0 {
                debug!("Pruned {} expired sessions ({} live)", removed, sessions.len());
            }
        }
    });
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medrecord_backend=debug,medrecord=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also try the crate root when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
