use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::auth::middleware;
use crate::core::aliases::DieselError;
use crate::core::app_error::{AppError, StdResponse};
use crate::core::app_state::AppState;
use crate::models::{
    CartItemEntity, CreateOrderDetailEntity, CreateOrderEntity, OrderDetailEntity, OrderEntity,
    OrderStatus,
};
use crate::money;
use crate::routes::patients::carts::cart_total_minor;
use crate::schema::{cart_items, order_details, orders};

const MAX_REFERENCE_ATTEMPTS: usize = 3;

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_order))
        .routes(utoipa_axum::routes!(get_my_orders))
        .routes(utoipa_axum::routes!(get_order))
        .routes(utoipa_axum::routes!(add_order_detail))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::patient_authorization,
        ))
}

/// Human-facing order reference, distinct from the numeric id. Globally
/// unique in practice; the checkout path still retries on collision.
pub(crate) fn generate_order_reference() -> String {
    let date = Utc::now().format("%Y%m%d");
    let entropy = Uuid::new_v4().simple().to_string();
    format!("MLK-{date}-{}", entropy[..10].to_ascii_uppercase())
}

#[derive(Serialize, ToSchema)]
pub struct GetOrderRes {
    pub order: OrderEntity,
    pub order_details: Vec<OrderDetailEntity>,
    pub total_minor: i64,
    pub total: String,
}

/// Check the patient's cart out into a new order. The order, its line items
/// and the cart clear commit or roll back together, so the cart and the
/// order can never disagree.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 422, description = "Cart is empty")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut attempts = 0;
    let (order, details) = loop {
        attempts += 1;
        let reference = generate_order_reference();

        let result = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let items: Vec<CartItemEntity> = cart_items::table
                        .filter(cart_items::patient_id.eq(patient_id))
                        .order_by(cart_items::id.asc())
                        .get_results(conn)
                        .await
                        .context("Failed to get cart items")?;

                    if items.is_empty() {
                        return Err(AppError::Validation("Cart is empty".into()));
                    }

                    let total_minor = cart_total_minor(&items);

                    let order: OrderEntity = diesel::insert_into(orders::table)
                        .values(CreateOrderEntity {
                            patient_id,
                            reference,
                            status: OrderStatus::Pending.as_str().into(),
                            total_minor,
                        })
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await?;

                    let new_details: Vec<CreateOrderDetailEntity> = items
                        .iter()
                        .map(|item| CreateOrderDetailEntity {
                            order_id: order.id,
                            prescription_id: item.prescription_id,
                            prescription_medicine_id: item.prescription_medicine_id,
                            quantity: item.quantity,
                            unit_price_minor: item.unit_price_minor,
                        })
                        .collect();

                    let details: Vec<OrderDetailEntity> =
                        diesel::insert_into(order_details::table)
                            .values(new_details)
                            .returning(OrderDetailEntity::as_returning())
                            .get_results(conn)
                            .await
                            .context("Failed to create order details")?;

                    diesel::delete(
                        cart_items::table.filter(cart_items::patient_id.eq(patient_id)),
                    )
                    .execute(conn)
                    .await
                    .context("Failed to clear cart")?;

                    Ok::<(OrderEntity, Vec<OrderDetailEntity>), AppError>((order, details))
                })
            })
            .await;

        match result {
            Ok(order_with_details) => break order_with_details,
            // The order reference is the only unique constraint in this
            // path, so a conflict means the generated reference collided.
            Err(AppError::Conflict(_)) if attempts < MAX_REFERENCE_ATTEMPTS => continue,
            Err(err) => return Err(err),
        }
    };

    let total_minor = order.total_minor;
    Ok(StdResponse::ok(
        GetOrderRes {
            order,
            order_details: details,
            total_minor,
            total: money::format_amount(total_minor),
        },
        "Created order successfully",
    ))
}

/// Fetch all orders belonging to the authenticated patient.
#[utoipa::path(
    get,
    path = "/my-orders",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<GetOrderRes>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders: Vec<OrderEntity> = orders::table
        .filter(orders::patient_id.eq(patient_id))
        .order_by(orders::updated_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get my orders")?;

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

    Ok(StdResponse::ok(
        orders_with_details,
        "Get my orders successfully",
    ))
}

/// Fetch a specific order belonging to the authenticated patient.
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
    Extension(patient_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: QueryResult<OrderEntity> = orders::table
        .find(id)
        .filter(orders::patient_id.eq(patient_id))
        .get_result(conn)
        .await;

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
pub struct AddOrderDetailReq {
    pub prescription_id: i32,
    pub prescription_medicine_id: i32,
    pub quantity: i32,
    /// Decimal amount string, e.g. "12.50".
    pub unit_price: String,
}

/// Append a line item to an existing order. Only PENDING orders accept new
/// lines; details are immutable once the order moves on.
#[utoipa::path(
    post,
    path = "/{id}/details",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to append to")
    ),
    request_body = AddOrderDetailReq,
    responses(
        (status = 200, description = "Added order detail successfully", body = StdResponse<OrderDetailEntity, String>),
        (status = 404, description = "No such order"),
        (status = 409, description = "Order no longer accepts line items")
    )
)]
async fn add_order_detail(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
    Json(body): Json<AddOrderDetailReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity <= 0 {
        return Err(AppError::Validation(
            "Quantity must be greater than zero".into(),
        ));
    }
    let unit_price_minor =
        money::parse_amount(&body.unit_price).map_err(|err| AppError::Validation(err.to_string()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let detail = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = orders::table
                    .find(id)
                    .filter(orders::patient_id.eq(patient_id))
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                if OrderStatus::parse(&order.status) != Some(OrderStatus::Pending) {
                    return Err(AppError::Conflict(format!(
                        "Order {} no longer accepts line items",
                        order.reference
                    )));
                }

                let detail: OrderDetailEntity = diesel::insert_into(order_details::table)
                    .values(CreateOrderDetailEntity {
                        order_id: order.id,
                        prescription_id: body.prescription_id,
                        prescription_medicine_id: body.prescription_medicine_id,
                        quantity: body.quantity,
                        unit_price_minor,
                    })
                    .returning(OrderDetailEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order detail")?;

                let line_total = money::line_total_minor(body.quantity, unit_price_minor);
                diesel::update(orders::table.find(order.id))
                    .set((
                        orders::total_minor.eq(orders::total_minor + line_total),
                        orders::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await
                    .context("Failed to update order total")?;

                Ok::<OrderDetailEntity, AppError>(detail)
            })
        })
        .await?;

    Ok(StdResponse::ok(detail, "Added order detail successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn references_are_distinct_across_many_generations() {
        let references: HashSet<String> =
            (0..1000).map(|_| generate_order_reference()).collect();
        assert_eq!(references.len(), 1000);
    }

    #[test]
    fn references_are_prefixed_and_human_readable() {
        let reference = generate_order_reference();
        assert!(reference.starts_with("MLK-"));
        assert!(
            reference
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
        );
    }
}
