use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use medlink_service::{
    core::{app_state::AppState, bootstrap, config, db, swagger},
    routes,
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    tracing::info!("Running migrations...");
    let config = config::load()?;
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::create_pool(&config.database.url).await?;
    let state = AppState::new(db_pool);

    let routes = routes::patients::routes_with_openapi(state.clone())
        .merge(routes::hospitals::routes_with_openapi())
        .merge(routes::pharmacies::routes_with_openapi())
        .merge(routes::sessions::routes_with_openapi(state.clone()))
        .merge(routes::orders::routes_with_openapi(state.clone()))
        .merge(routes::payments::routes_with_openapi(state.clone()));

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("MedLink API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let app = Router::new()
        .merge(routes)
        .merge(swagger_ui)
        .with_state(state);

    bootstrap::serve("MedLink", app, config.server.port).await
}
