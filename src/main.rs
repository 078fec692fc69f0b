use tracing_subscriber::EnvFilter;

use tunebuild_api::{
    api::{create_router, AppState},
    config::Config,
    services::Catalog,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    // The catalog is engineered once; every run ranks against it
    let catalog = Catalog::load(&config)?;
    tracing::info!(
        tracks = catalog.features.len(),
        columns = catalog.features.columns().len(),
        "Catalog ready"
    );

    let address = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, catalog)?;

    // Create the router with all routes
    let app = create_router(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
