use anyhow::Result;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Install the global tracing subscriber. Call once, before anything logs.
pub fn init_tracing() {
    tracing_subscriber::fmt().init();
}

/// Load `.env` into the process environment if present.
pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Bind and serve the finished router until the process is stopped.
pub async fn serve(service_name: &str, app: Router, port: u16) -> Result<()> {
    let app = app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("{service_name} listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
