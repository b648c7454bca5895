pub mod accounts;
pub mod carts;
pub mod orders;

use utoipa_axum::router::OpenApiRouter;

use crate::core::app_state::AppState;

/// All patient-facing routes: account endpoints at the nest root, cart and
/// order endpoints guarded by patient authorization underneath.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/patients",
        accounts::routes_with_openapi()
            .nest("/cart", carts::routes_with_openapi(state.clone()))
            .nest("/orders", orders::routes_with_openapi(state)),
    )
}
