use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::auth::middleware;
use crate::core::aliases::DieselError;
use crate::core::app_error::{AppError, StdResponse};
use crate::core::app_state::AppState;
use crate::models::{CartItemEntity, CreateCartItemEntity};
use crate::money;
use crate::schema::cart_items;

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_cart))
        .routes(utoipa_axum::routes!(get_cart_count))
        .routes(utoipa_axum::routes!(add_cart_item))
        .routes(utoipa_axum::routes!(update_cart_item))
        .routes(utoipa_axum::routes!(remove_cart_item))
        .routes(utoipa_axum::routes!(empty_cart))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::patient_authorization,
        ))
}

/// Sum of quantity x unit price over the given lines, in minor units.
pub(crate) fn cart_total_minor(items: &[CartItemEntity]) -> i64 {
    items
        .iter()
        .map(|item| money::line_total_minor(item.quantity, item.unit_price_minor))
        .sum()
}

#[derive(Serialize, ToSchema)]
pub struct GetCartRes {
    pub cart_items: Vec<CartItemEntity>,
    pub total_minor: i64,
    pub total: String,
}

/// Fetch the authenticated patient's cart in insertion order, with the total.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get cart successfully", body = StdResponse<GetCartRes, String>)
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart_items: Vec<CartItemEntity> = cart_items::table
        .filter(cart_items::patient_id.eq(patient_id))
        .order_by(cart_items::id.asc())
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    let total_minor = cart_total_minor(&cart_items);

    Ok(StdResponse::ok(
        GetCartRes {
            cart_items,
            total_minor,
            total: money::format_amount(total_minor),
        },
        "Get cart successfully",
    ))
}

/// Number of distinct line items in the cart (not the summed quantity).
#[utoipa::path(
    get,
    path = "/count",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get cart count successfully", body = StdResponse<i64, String>)
    )
)]
async fn get_cart_count(
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let count: i64 = cart_items::table
        .filter(cart_items::patient_id.eq(patient_id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count cart items")?;

    Ok(StdResponse::ok(count, "Get cart count successfully"))
}

#[derive(Deserialize, ToSchema)]
pub struct AddCartItemReq {
    pub prescription_id: i32,
    pub prescription_medicine_id: i32,
    pub quantity: i32,
    /// Decimal amount string, e.g. "12.50".
    pub unit_price: String,
}

/// Add a prescribed medicine to the cart. Re-adding an existing
/// (prescription, medicine) line replaces its quantity and price instead of
/// inserting a duplicate row.
#[utoipa::path(
    post,
    path = "/items",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    request_body = AddCartItemReq,
    responses(
        (status = 200, description = "Added cart item successfully", body = StdResponse<CartItemEntity, String>),
        (status = 422, description = "Invalid quantity or unit price")
    )
)]
async fn add_cart_item(
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
    Json(body): Json<AddCartItemReq>,
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

    let item: CartItemEntity = diesel::insert_into(cart_items::table)
        .values(CreateCartItemEntity {
            patient_id,
            prescription_id: body.prescription_id,
            prescription_medicine_id: body.prescription_medicine_id,
            quantity: body.quantity,
            unit_price_minor,
        })
        .on_conflict((
            cart_items::patient_id,
            cart_items::prescription_id,
            cart_items::prescription_medicine_id,
        ))
        .do_update()
        .set((
            cart_items::quantity.eq(body.quantity),
            cart_items::unit_price_minor.eq(unit_price_minor),
            cart_items::updated_at.eq(diesel::dsl::now),
        ))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to upsert cart item")?;

    Ok(StdResponse::ok(item, "Added cart item successfully"))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateCartItemReq {
    pub quantity: i32,
}

/// Change the quantity of one cart line.
#[utoipa::path(
    patch,
    path = "/items/{id}",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Cart item ID to update")
    ),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Updated cart item successfully", body = StdResponse<CartItemEntity, String>),
        (status = 404, description = "No such cart item"),
        (status = 422, description = "Invalid quantity")
    )
)]
async fn update_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity <= 0 {
        return Err(AppError::Validation(
            "Quantity must be greater than zero".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: QueryResult<CartItemEntity> = diesel::update(
        cart_items::table
            .find(id)
            .filter(cart_items::patient_id.eq(patient_id)),
    )
    .set((
        cart_items::quantity.eq(body.quantity),
        cart_items::updated_at.eq(diesel::dsl::now),
    ))
    .returning(CartItemEntity::as_returning())
    .get_result(conn)
    .await;

    match item {
        Ok(item) => Ok(StdResponse::ok(item, "Updated cart item successfully")),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

/// Remove one line from the cart. Removing an id that is not in the cart
/// fails with 404 rather than erroring out.
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Cart item ID to remove")
    ),
    responses(
        (status = 200, description = "Removed cart item successfully", body = StdResponse<CartItemEntity, String>),
        (status = 404, description = "No such cart item")
    )
)]
async fn remove_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: QueryResult<CartItemEntity> = diesel::delete(
        cart_items::table
            .find(id)
            .filter(cart_items::patient_id.eq(patient_id)),
    )
    .returning(CartItemEntity::as_returning())
    .get_result(conn)
    .await;

    match item {
        Ok(item) => Ok(StdResponse::ok(item, "Removed cart item successfully")),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

/// Delete every line in the patient's cart in one statement.
#[utoipa::path(
    delete,
    path = "/",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Emptied cart successfully", body = StdResponse<usize, String>)
    )
)]
async fn empty_cart(
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted = diesel::delete(cart_items::table.filter(cart_items::patient_id.eq(patient_id)))
        .execute(conn)
        .await
        .context("Failed to empty cart")?;

    Ok(StdResponse::ok(deleted, "Emptied cart successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(id: i32, quantity: i32, unit_price_minor: i64) -> CartItemEntity {
        CartItemEntity {
            id,
            patient_id: 1,
            prescription_id: 5,
            prescription_medicine_id: 9,
            quantity,
            unit_price_minor,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn total_is_exact_in_minor_units() {
        let items = vec![line(1, 2, 1000), line(2, 1, 550)];
        assert_eq!(cart_total_minor(&items), 2550);
        assert_eq!(money::format_amount(cart_total_minor(&items)), "25.50");
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(cart_total_minor(&[]), 0);
    }
}
