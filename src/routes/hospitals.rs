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
use crate::models::{CreateHospitalEntity, HospitalEntity};
use crate::schema::hospitals;

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/hospitals",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(register_hospital))
            .routes(utoipa_axum::routes!(login_hospital))
            .routes(utoipa_axum::routes!(update_hospital))
            .routes(utoipa_axum::routes!(delete_hospital)),
    )
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterHospitalReq {
    pub name: Option<String>,
    pub government_id: String,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub password: String,
}

/// Register a new hospital account. Hospitals are identified by their
/// government id, which keeps its case.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Hospitals"],
    request_body = RegisterHospitalReq,
    responses(
        (status = 200, description = "Registered hospital successfully", body = StdResponse<HospitalEntity, String>),
        (status = 409, description = "An account with this government ID already exists")
    )
)]
async fn register_hospital(
    State(state): State<AppState>,
    Json(body): Json<RegisterHospitalReq>,
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

    let hospital: HospitalEntity = diesel::insert_into(hospitals::table)
        .values(CreateHospitalEntity {
            name: credentials::normalize_optional(body.name),
            government_id,
            email: credentials::normalize_optional(body.email),
            contact: credentials::normalize_optional(body.contact),
            password_hash: credentials::hash_password(&body.password)?,
        })
        .returning(HospitalEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("An account with this government ID already exists".into())
            }
            other => other.into(),
        })?;

    Ok(StdResponse::ok(hospital, "Registered hospital successfully"))
}

#[derive(Deserialize, ToSchema)]
pub struct HospitalLoginReq {
    pub government_id: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct HospitalLoginRes {
    pub token: String,
    pub account: HospitalEntity,
}

/// Log a hospital in and open a session.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Hospitals"],
    request_body = HospitalLoginReq,
    responses(
        (status = 200, description = "Logged in successfully", body = StdResponse<HospitalLoginRes, String>),
        (status = 401, description = "Unknown government ID, wrong password or disabled account")
    )
)]
async fn login_hospital(
    State(state): State<AppState>,
    Json(body): Json<HospitalLoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let government_id = credentials::normalize_field(&body.government_id);

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let hospital: HospitalEntity = hospitals::table
        .filter(hospitals::government_id.eq(&government_id))
        .select(HospitalEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to look up hospital account")?
        .ok_or_else(|| {
            AppError::Unauthorized("No account found with this government ID".into())
        })?;

    if hospital.deleted_at.is_some() {
        return Err(AppError::Unauthorized("This account has been disabled".into()));
    }
    if !credentials::verify_password(&body.password, &hospital.password_hash) {
        return Err(AppError::Unauthorized("Incorrect password".into()));
    }

    let token = state.sessions.create(SessionContext {
        hospital_id: Some(hospital.id),
        ..SessionContext::default()
    });

    Ok(StdResponse::ok(
        HospitalLoginRes {
            token,
            account: hospital,
        },
        "Logged in successfully",
    ))
}

/// Editing hospital accounts is not supported yet.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Hospitals"],
    params(
        ("id" = i32, Path, description = "Hospital ID to edit")
    ),
    responses(
        (status = 501, description = "Editing hospital accounts is not supported")
    )
)]
async fn update_hospital(
    Path(_id): Path<i32>,
) -> Result<StdResponse<HospitalEntity, String>, AppError> {
    Err(AppError::Unsupported(
        "Editing hospital accounts is not supported".into(),
    ))
}

/// Deleting hospital accounts is not supported yet.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Hospitals"],
    params(
        ("id" = i32, Path, description = "Hospital ID to delete")
    ),
    responses(
        (status = 501, description = "Deleting hospital accounts is not supported")
    )
)]
async fn delete_hospital(
    Path(_id): Path<i32>,
) -> Result<StdResponse<HospitalEntity, String>, AppError> {
    Err(AppError::Unsupported(
        "Deleting hospital accounts is not supported".into(),
    ))
}
