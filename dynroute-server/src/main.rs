//! Entry point: loads configuration, wires Store/Sandbox Host/Registry, and
//! runs the hyper accept loop.

mod http;

use std::sync::Arc;

use dynroute_core::{
    Config, DefaultSandboxHost, NullGenerator, Registry, SandboxHost, SqliteStore, Store,
};

use crate::http::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let host: Arc<dyn SandboxHost> = Arc::new(DefaultSandboxHost::new()?);
    let registry = Arc::new(Registry::new(store.clone(), host));

    let state = Arc::new(AppState {
        store,
        registry,
        generator: Arc::new(NullGenerator),
        config: config.clone(),
    });

    tracing::info!(port = config.port, "starting dynroute-server");
    http::serve(state, config.port).await
}
