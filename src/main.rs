//! Gatehouse - Authentication & Authorization Backend
//! Mission: Issue and validate bearer tokens, gate every request

use anyhow::{Context, Result};
use dotenv::dotenv;
use gatehouse_backend::auth::{create_router, AuthState, JwtHandler, UserStore};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Base64 of a throwaway dev secret. Real deployments must set JWT_SECRET_B64.
const DEV_JWT_SECRET_B64: &str =
    "ZGV2LXNlY3JldC1jaGFuZ2UtaW4tcHJvZHVjdGlvbi1taW5pbXVtLTMyLWNoYXJhY3RlcnM=";

const DEFAULT_TTL_MS: i64 = 86_400_000; // 24 hours

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("Gatehouse auth backend starting");

    let auth_db_path = resolve_data_path(env::var("AUTH_DB_PATH").ok(), "gatehouse_auth.db");
    let jwt_secret = env::var("JWT_SECRET_B64").unwrap_or_else(|_| DEV_JWT_SECRET_B64.to_string());
    let jwt_ttl_ms = env::var("JWT_TTL_MS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_TTL_MS);

    let user_store = Arc::new(UserStore::new(&auth_db_path)?);
    let jwt_handler = Arc::new(JwtHandler::from_base64_secret(&jwt_secret, jwt_ttl_ms)?);
    let auth_state = AuthState::new(user_store, jwt_handler);

    info!("Authentication store initialized at: {}", auth_db_path);
    info!("Token TTL: {}ms", jwt_ttl_ms);

    let app = create_router(auth_state);

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatehouse_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the manifest directory (common when run with --manifest-path)
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}

fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return base.join(default_filename).to_string_lossy().to_string();
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    // Treat relative paths as relative to the manifest dir, not the caller's cwd
    base.join(p).to_string_lossy().to_string()
}
