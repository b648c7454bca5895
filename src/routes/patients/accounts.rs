use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel::result::DatabaseErrorKind;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::auth::{self, SessionContext};
use crate::core::aliases::DieselError;
use crate::core::app_error::{AppError, StdResponse};
use crate::core::app_state::AppState;
use crate::credentials;
use crate::models::{CreatePatientEntity, PatientEntity};
use crate::schema::patients;

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(register_patient))
        .routes(utoipa_axum::routes!(login_patient))
        .routes(utoipa_axum::routes!(update_patient))
        .routes(utoipa_axum::routes!(delete_patient))
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterPatientReq {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub contact: Option<String>,
    pub password: String,
    /// Defaults to the regular patient role when omitted.
    pub user_role: Option<i32>,
}

/// Register a new patient account.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Patients"],
    request_body = RegisterPatientReq,
    responses(
        (status = 200, description = "Registered patient successfully", body = StdResponse<PatientEntity, String>),
        (status = 409, description = "An account with this email already exists")
    )
)]
async fn register_patient(
    State(state): State<AppState>,
    Json(body): Json<RegisterPatientReq>,
) -> Result<impl IntoResponse, AppError> {
    let email = credentials::normalize_email(&body.email);
    credentials::validate_email(&email)?;
    credentials::validate_password(&body.password)?;

    let user_role = body.user_role.unwrap_or(auth::PATIENT_ROLE_FLAG);
    if user_role != auth::ADMIN_ROLE_FLAG && user_role != auth::PATIENT_ROLE_FLAG {
        return Err(AppError::Validation(format!(
            "{user_role} is not a valid user role"
        )));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let patient: PatientEntity = diesel::insert_into(patients::table)
        .values(CreatePatientEntity {
            first_name: credentials::normalize_optional(body.first_name),
            last_name: credentials::normalize_optional(body.last_name),
            email,
            contact: credentials::normalize_optional(body.contact),
            password_hash: credentials::hash_password(&body.password)?,
            user_role,
        })
        .returning(PatientEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("An account with this email already exists".into())
            }
            other => other.into(),
        })?;

    Ok(StdResponse::ok(patient, "Registered patient successfully"))
}

#[derive(Deserialize, ToSchema)]
pub struct PatientLoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct PatientLoginRes {
    pub token: String,
    pub account: PatientEntity,
}

/// Log a patient in and open a session. Admin accounts log in here too and
/// resolve as admins through their role flag.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Patients"],
    request_body = PatientLoginReq,
    responses(
        (status = 200, description = "Logged in successfully", body = StdResponse<PatientLoginRes, String>),
        (status = 401, description = "Unknown email, wrong password or disabled account")
    )
)]
async fn login_patient(
    State(state): State<AppState>,
    Json(body): Json<PatientLoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let email = credentials::normalize_email(&body.email);

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let patient: PatientEntity = patients::table
        .filter(patients::email.eq(&email))
        .select(PatientEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to look up patient account")?
        .ok_or_else(|| AppError::Unauthorized("No account found with this email".into()))?;

    if patient.deleted_at.is_some() {
        return Err(AppError::Unauthorized("This account has been disabled".into()));
    }
    if !credentials::verify_password(&body.password, &patient.password_hash) {
        return Err(AppError::Unauthorized("Incorrect password".into()));
    }

    let token = state.sessions.create(SessionContext {
        patient_id: Some(patient.id),
        user_role: Some(patient.user_role),
        ..SessionContext::default()
    });

    Ok(StdResponse::ok(
        PatientLoginRes {
            token,
            account: patient,
        },
        "Logged in successfully",
    ))
}

/// Editing patient accounts is not supported yet.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Patients"],
    params(
        ("id" = i32, Path, description = "Patient ID to edit")
    ),
    responses(
        (status = 501, description = "Editing patient accounts is not supported")
    )
)]
async fn update_patient(
    Path(_id): Path<i32>,
) -> Result<StdResponse<PatientEntity, String>, AppError> {
    Err(AppError::Unsupported(
        "Editing patient accounts is not supported".into(),
    ))
}

/// Deleting patient accounts is not supported yet.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Patients"],
    params(
        ("id" = i32, Path, description = "Patient ID to delete")
    ),
    responses(
        (status = 501, description = "Deleting patient accounts is not supported")
    )
)]
async fn delete_patient(
    Path(_id): Path<i32>,
) -> Result<StdResponse<PatientEntity, String>, AppError> {
    Err(AppError::Unsupported(
        "Deleting patient accounts is not supported".into(),
    ))
}
