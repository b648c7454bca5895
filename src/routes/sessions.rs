use axum::{Extension, extract::State, http::HeaderMap, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::auth::{self, SessionContext, middleware};
use crate::core::app_error::{AppError, StdResponse};
use crate::core::app_state::AppState;

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/sessions",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(me))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::login_authorization,
            ))
            .merge(OpenApiRouter::new().routes(utoipa_axum::routes!(logout))),
    )
}

#[derive(Serialize, ToSchema)]
pub struct MeRes {
    pub user_type: String,
    pub user_id: i32,
    pub is_admin: bool,
    pub dashboard_url: String,
}

/// Resolve the calling session to its principal and dashboard destination.
#[utoipa::path(
    get,
    path = "/me",
    tags = ["Sessions"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Resolved session successfully", body = StdResponse<MeRes, String>)
    )
)]
async fn me(Extension(ctx): Extension<SessionContext>) -> Result<impl IntoResponse, AppError> {
    let user_type = auth::user_type(&ctx)
        .ok_or_else(|| AppError::Unauthorized("Session carries no identity".into()))?;
    let user_id = auth::user_id(&ctx)
        .ok_or_else(|| AppError::Unauthorized("Session carries no identity".into()))?;

    Ok(StdResponse::ok(
        MeRes {
            user_type: user_type.as_str().to_string(),
            user_id,
            is_admin: auth::is_admin(&ctx),
            dashboard_url: auth::dashboard_url(&ctx).to_string(),
        },
        "Resolved session successfully",
    ))
}

/// Destroy the calling session. Safe to repeat; a missing or already
/// destroyed session simply reports `false`.
#[utoipa::path(
    post,
    path = "/logout",
    tags = ["Sessions"],
    responses(
        (status = 200, description = "Logged out successfully", body = StdResponse<bool, String>)
    )
)]
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let destroyed = middleware::bearer_token(&headers)
        .map(|token| state.sessions.destroy(token))
        .unwrap_or(false);

    Ok(StdResponse::ok(destroyed, "Logged out successfully"))
}
