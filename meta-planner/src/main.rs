use std::sync::Arc;

use meta_planner::backend::AdapterRegistry;
use meta_planner::config::AppConfig;
use meta_planner::connectivity::InMemoryConnectivity;
use meta_planner::web::{AppState, create_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();

    // Load the connectivity graph (fail fast if unavailable)
    let store = InMemoryConnectivity::load(&config.connectivity_path, config.planner.nearby_radius_m)
        .expect("Failed to load connectivity snapshot");
    info!(
        path = %config.connectivity_path.display(),
        backends = store.backend_count(),
        transfers = store.transfer_count(),
        "loaded connectivity"
    );

    let registry = AdapterRegistry::with_defaults().with_response_cache(config.cache.clone());
    let state = AppState::new(Arc::new(store), registry, config.planner.clone());
    let app = create_router(state);

    info!(addr = %config.addr, "trip planner listening");
    info!("  GET  /health    - Health check");
    info!("  GET  /trips/ws  - Streaming trip search");
    info!("  POST /trips     - One-shot trip search");

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app).await.expect("Server failed");
}
