use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::auth::middleware;
use crate::core::aliases::DieselError;
use crate::core::app_error::{AppError, StdResponse};
use crate::core::app_state::AppState;
use crate::models::{OrderDetailEntity, OrderEntity, OrderStatus};
use crate::money;
use crate::routes::patients::orders::GetOrderRes;
use crate::schema::{order_details, orders};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(update_order_status))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::admin_authorization,
            )),
    )
}

/// Fetch all orders in the system.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List all orders", body = StdResponse<Vec<GetOrderRes>, String>)
    )
)]
async fn get_orders(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders: Vec<OrderEntity> = orders::table
        .order_by(orders::updated_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let details: Vec<OrderDetailEntity> = order_details::table
        .filter(order_details::order_id.eq_any(&order_ids))
        .get_results(conn)
        .await
        .context("Failed to get order details")?;

    let mut group: HashMap<i32, Vec<OrderDetailEntity>> = HashMap::new();
    for detail in details {
        group.entry(detail.order_id).or_default().push(detail);
    }

    let orders_with_details: Vec<GetOrderRes> = orders
        .into_iter()
        .map(|order| {
            let order_details = group.remove(&order.id).unwrap_or_default();
            let total_minor = order.total_minor;
            GetOrderRes {
                order,
                order_details,
                total_minor,
                total: money::format_amount(total_minor),
            }
        })
        .collect();

    Ok(StdResponse::ok(orders_with_details, "Get orders successfully"))
}

/// Fetch a specific order.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "No such order")
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: QueryResult<OrderEntity> = orders::table.find(id).get_result(conn).await;

    let order = match order {
        Ok(order) => order,
        Err(DieselError::NotFound) => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let order_details: Vec<OrderDetailEntity> = order_details::table
        .filter(order_details::order_id.eq(order.id))
        .get_results(conn)
        .await
        .context("Failed to get order details")?;

    let total_minor = order.total_minor;
    Ok(StdResponse::ok(
        GetOrderRes {
            order,
            order_details,
            total_minor,
            total: money::format_amount(total_minor),
        },
        "Get order successfully",
    ))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateOrderStatusReq {
    pub status: String,
}

/// Move an order through its lifecycle. Unrecognized statuses and illegal
/// transitions are rejected; the update is conditioned on the status the
/// transition was checked against, so concurrent updates cannot interleave.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Updated order status successfully", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Unrecognized status"),
        (status = 404, description = "No such order"),
        (status = 409, description = "Illegal status transition")
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let next = OrderStatus::parse(&body.status).ok_or_else(|| {
        AppError::BadRequest(format!("{} is not a recognized order status", body.status))
    })?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = orders::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    let current = OrderStatus::parse(&order.status)
        .context("Stored order status is not part of the lifecycle")?;
    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Order cannot move from {} to {}",
            order.status,
            next.as_str()
        )));
    }

    let updated: QueryResult<OrderEntity> = diesel::update(
        orders::table
            .find(id)
            .filter(orders::status.eq(current.as_str())),
    )
    .set((
        orders::status.eq(next.as_str()),
        orders::updated_at.eq(diesel::dsl::now),
    ))
    .returning(OrderEntity::as_returning())
    .get_result(conn)
    .await;

    match updated {
        Ok(order) => Ok(StdResponse::ok(order, "Updated order status successfully")),
        Err(DieselError::NotFound) => Err(AppError::Conflict(
            "Order status changed concurrently, retry".into(),
        )),
        Err(err) => Err(AppError::Other(err.into())),
    }
}
