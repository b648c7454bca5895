use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::result::DatabaseErrorKind;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::auth::SessionContext;
use crate::core::aliases::DieselError;
use crate::core::app_error::{AppError, StdResponse};
use crate::core::app_state::AppState;
use crate::credentials;
use crate::models::{CreatePharmacyEntity, PharmacyEntity};
use crate::schema::pharmacies;

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/pharmacies",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(register_pharmacy))
            .routes(utoipa_axum::routes!(login_pharmacy))
            .routes(utoipa_axum::routes!(update_pharmacy))
            .routes(utoipa_axum::routes!(delete_pharmacy)),
    )
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterPharmacyReq {
    pub name: Option<String>,
    pub government_id: String,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub password: String,
}

/// Register a new pharmacy account.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Pharmacies"],
    request_body = RegisterPharmacyReq,
    responses(
        (status = 200, description = "Registered pharmacy successfully", body = StdResponse<PharmacyEntity, String>),
        (status = 409, description = "An account with this government ID already exists")
    )
)]
async fn register_pharmacy(
    State(state): State<AppState>,
    Json(body): Json<RegisterPharmacyReq>,
) -> Result<impl IntoResponse, AppError> {
    let government_id = credentials::normalize_field(&body.government_id);
    if government_id.is_empty() {
        return Err(AppError::Validation(
            "Government ID must not be empty".into(),
        ));
    }
    credentials::validate_password(&body.password)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pharmacy: PharmacyEntity = diesel::insert_into(pharmacies::table)
        .values(CreatePharmacyEntity {
            name: credentials::normalize_optional(body.name),
            government_id,
            email: credentials::normalize_optional(body.email),
            contact: credentials::normalize_optional(body.contact),
            password_hash: credentials::hash_password(&body.password)?,
        })
        .returning(PharmacyEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("An account with this government ID already exists".into())
            }
            other => other.into(),
        })?;

    Ok(StdResponse::ok(pharmacy, "Registered pharmacy successfully"))
}

#[derive(Deserialize, ToSchema)]
pub struct PharmacyLoginReq {
    pub government_id: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct PharmacyLoginRes {
    pub token: String,
    pub account: PharmacyEntity,
}

/// Log a pharmacy in and open a session.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Pharmacies"],
    request_body = PharmacyLoginReq,
    responses(
        (status = 200, description = "Logged in successfully", body = StdResponse<PharmacyLoginRes, String>),
        (status = 401, description = "Unknown government ID, wrong password or disabled account")
    )
)]
async fn login_pharmacy(
    State(state): State<AppState>,
    Json(body): Json<PharmacyLoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let government_id = credentials::normalize_field(&body.government_id);

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pharmacy: PharmacyEntity = pharmacies::table
        .filter(pharmacies::government_id.eq(&government_id))
        .select(PharmacyEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to look up pharmacy account")?
        .ok_or_else(|| {
            AppError::Unauthorized("No account found with this government ID".into())
        })?;

    if pharmacy.deleted_at.is_some() {
        return Err(AppError::Unauthorized("This account has been disabled".into()));
    }
    if !credentials::verify_password(&body.password, &pharmacy.password_hash) {
        return Err(AppError::Unauthorized("Incorrect password".into()));
    }

    let token = state.sessions.create(SessionContext {
        pharmacy_id: Some(pharmacy.id),
        ..SessionContext::default()
    });

    Ok(StdResponse::ok(
        PharmacyLoginRes {
            token,
            account: pharmacy,
        },
        "Logged in successfully",
    ))
}

/// Editing pharmacy accounts is not supported yet.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Pharmacies"],
    params(
        ("id" = i32, Path, description = "Pharmacy ID to edit")
    ),
    responses(
        (status = 501, description = "Editing pharmacy accounts is not supported")
    )
)]
async fn update_pharmacy(
    Path(_id): Path<i32>,
) -> Result<StdResponse<PharmacyEntity, String>, AppError> {
    Err(AppError::Unsupported(
        "Editing pharmacy accounts is not supported".into(),
    ))
}

/// Deleting pharmacy accounts is not supported yet.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Pharmacies"],
    params(
        ("id" = i32, Path, description = "Pharmacy ID to delete")
    ),
    responses(
        (status = 501, description = "Deleting pharmacy accounts is not supported")
    )
)]
async fn delete_pharmacy(
    Path(_id): Path<i32>,
) -> Result<StdResponse<PharmacyEntity, String>, AppError> {
    Err(AppError::Unsupported(
        "Deleting pharmacy accounts is not supported".into(),
    ))
}
