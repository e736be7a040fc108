//! HTTP service that detects ingredients in photos, suggests recipes for them
//! and keeps the user's recipes, favorites and ingredient queries.

use shared::config::Settings;
use shared::supabase::SupabaseClient;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging via RUST_LOG
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::new()?;
    settings.require_backend()?;

    let backend = Arc::new(SupabaseClient::from_settings(&settings)?);
    let state = api::AppState::new(&settings, backend.clone(), backend)?;

    let addr: std::net::SocketAddr = settings.bind_addr.parse()?;
    info!("starting recipe-api on {addr}");
    axum::Server::bind(&addr)
        .serve(api::router(state).into_make_service())
        .await?;
    Ok(())
}
