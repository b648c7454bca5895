use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::result::DatabaseErrorKind;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::auth::middleware;
use crate::core::aliases::DieselError;
use crate::core::app_error::{AppError, StdResponse};
use crate::core::app_state::AppState;
use crate::models::{CreatePaymentEntity, PaymentEntity, PaymentStatus};
use crate::money;
use crate::schema::payments;

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let patient_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(record_payment))
        .routes(utoipa_axum::routes!(get_my_payments))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::patient_authorization,
        ));

    let admin_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_payment_by_reference))
        .routes(utoipa_axum::routes!(get_payments_by_prescription))
        .routes(utoipa_axum::routes!(update_payment_status))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admin_authorization,
        ));

    let shared_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(prescription_settled))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::login_authorization,
        ));

    OpenApiRouter::new().nest(
        "/payments",
        patient_routes.merge(admin_routes).merge(shared_routes),
    )
}

#[derive(Deserialize, ToSchema)]
pub struct RecordPaymentReq {
    pub prescription_id: i32,
    /// Decimal amount string as confirmed by the gateway, e.g. "25.50".
    pub amount: String,
    pub currency: Option<String>,
    pub method: Option<String>,
    pub transaction_ref: String,
    pub authorization_code: Option<String>,
    pub channel: Option<String>,
    pub status: Option<String>,
}

/// Record a settlement event reported by the payment gateway. The
/// transaction reference is unique, so a webhook retry can never record the
/// same charge twice.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Payments"],
    security(("bearerAuth" = [])),
    request_body = RecordPaymentReq,
    responses(
        (status = 200, description = "Recorded payment successfully", body = StdResponse<PaymentEntity, String>),
        (status = 409, description = "Transaction reference already recorded"),
        (status = 422, description = "Invalid amount, status or reference")
    )
)]
async fn record_payment(
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
    Json(body): Json<RecordPaymentReq>,
) -> Result<impl IntoResponse, AppError> {
    let transaction_ref = body.transaction_ref.trim().to_owned();
    if transaction_ref.is_empty() {
        return Err(AppError::Validation(
            "Transaction reference must not be empty".into(),
        ));
    }
    let amount_minor =
        money::parse_amount(&body.amount).map_err(|err| AppError::Validation(err.to_string()))?;
    let status = match body.status {
        Some(raw) => PaymentStatus::parse(&raw).ok_or_else(|| {
            AppError::Validation(format!("{raw} is not a recognized payment status"))
        })?,
        None => PaymentStatus::Success,
    };

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payment: PaymentEntity = diesel::insert_into(payments::table)
        .values(CreatePaymentEntity {
            prescription_id: body.prescription_id,
            patient_id,
            amount_minor,
            currency: body.currency.unwrap_or_else(|| "GHS".into()),
            method: body.method.unwrap_or_else(|| "paystack".into()),
            transaction_ref,
            authorization_code: body.authorization_code,
            channel: body.channel,
            status: status.as_str().into(),
        })
        .returning(PaymentEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict(
                    "A payment with this transaction reference has already been recorded".into(),
                )
            }
            other => other.into(),
        })?;

    Ok(StdResponse::ok(payment, "Recorded payment successfully"))
}

/// Fetch all payments recorded for the authenticated patient.
#[utoipa::path(
    get,
    path = "/my",
    tags = ["Payments"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my payments", body = StdResponse<Vec<PaymentEntity>, String>)
    )
)]
async fn get_my_payments(
    State(state): State<AppState>,
    Extension(patient_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payments: Vec<PaymentEntity> = payments::table
        .filter(payments::patient_id.eq(patient_id))
        .order_by(payments::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get my payments")?;

    Ok(StdResponse::ok(payments, "Get my payments successfully"))
}

/// Look a payment up by its gateway transaction reference.
#[utoipa::path(
    get,
    path = "/by-reference/{reference}",
    tags = ["Payments"],
    security(("bearerAuth" = [])),
    params(
        ("reference" = String, Path, description = "Gateway transaction reference")
    ),
    responses(
        (status = 200, description = "Get payment successfully", body = StdResponse<PaymentEntity, String>),
        (status = 404, description = "No payment with this reference")
    )
)]
async fn get_payment_by_reference(
    Path(reference): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payment: QueryResult<PaymentEntity> = payments::table
        .filter(payments::transaction_ref.eq(&reference))
        .first(conn)
        .await;

    match payment {
        Ok(payment) => Ok(StdResponse::ok(payment, "Get payment successfully")),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

/// Fetch all payment events recorded against a prescription.
#[utoipa::path(
    get,
    path = "/by-prescription/{prescription_id}",
    tags = ["Payments"],
    security(("bearerAuth" = [])),
    params(
        ("prescription_id" = i32, Path, description = "Prescription ID")
    ),
    responses(
        (status = 200, description = "List payments for prescription", body = StdResponse<Vec<PaymentEntity>, String>)
    )
)]
async fn get_payments_by_prescription(
    Path(prescription_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payments: Vec<PaymentEntity> = payments::table
        .filter(payments::prescription_id.eq(prescription_id))
        .order_by(payments::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get payments for prescription")?;

    Ok(StdResponse::ok(payments, "Get payments successfully"))
}

#[derive(Serialize, ToSchema)]
pub struct PrescriptionSettledRes {
    pub prescription_id: i32,
    pub settled: bool,
}

/// Whether a prescription has been settled by a successful payment.
/// Pending or failed records do not count.
#[utoipa::path(
    get,
    path = "/prescriptions/{prescription_id}/settled",
    tags = ["Payments"],
    security(("bearerAuth" = [])),
    params(
        ("prescription_id" = i32, Path, description = "Prescription ID")
    ),
    responses(
        (status = 200, description = "Settlement check", body = StdResponse<PrescriptionSettledRes, String>)
    )
)]
async fn prescription_settled(
    Path(prescription_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let successful: i64 = payments::table
        .filter(payments::prescription_id.eq(prescription_id))
        .filter(payments::status.eq(PaymentStatus::Success.as_str()))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check prescription settlement")?;

    Ok(StdResponse::ok(
        PrescriptionSettledRes {
            prescription_id,
            settled: successful > 0,
        },
        "Settlement check successful",
    ))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePaymentStatusReq {
    pub status: String,
}

/// Correct a pending payment's status once the gateway reports the outcome.
/// Settled outcomes never move backward.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Payments"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Payment ID to update")
    ),
    request_body = UpdatePaymentStatusReq,
    responses(
        (status = 200, description = "Updated payment status successfully", body = StdResponse<PaymentEntity, String>),
        (status = 400, description = "Unrecognized status"),
        (status = 404, description = "No such payment"),
        (status = 409, description = "Illegal status transition")
    )
)]
async fn update_payment_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UpdatePaymentStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let next = PaymentStatus::parse(&body.status).ok_or_else(|| {
        AppError::BadRequest(format!("{} is not a recognized payment status", body.status))
    })?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payment: PaymentEntity = payments::table
        .find(id)
        .first(conn)
        .await
        .optional()
        .context("Failed to look up payment")?
        .ok_or(AppError::NotFound)?;

    let current = PaymentStatus::parse(&payment.status)
        .context("Stored payment status is not part of the lifecycle")?;
    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Payment cannot move from {} to {}",
            payment.status,
            next.as_str()
        )));
    }

    let updated: QueryResult<PaymentEntity> = diesel::update(
        payments::table
            .find(id)
            .filter(payments::status.eq(current.as_str())),
    )
    .set((
        payments::status.eq(next.as_str()),
        payments::updated_at.eq(diesel::dsl::now),
    ))
    .returning(PaymentEntity::as_returning())
    .get_result(conn)
    .await;

    match updated {
        Ok(payment) => Ok(StdResponse::ok(
            payment,
            "Updated payment status successfully",
        )),
        Err(DieselError::NotFound) => Err(AppError::Conflict(
            "Payment status changed concurrently, retry".into(),
        )),
        Err(err) => Err(AppError::Other(err.into())),
    }
}
