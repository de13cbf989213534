use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentFilters, CreateAppointmentRequest, SchedulingError, UpdateStatusRequest,
};
use crate::services::consultation::ConsultationAuthorizer;
use crate::services::ledger::AppointmentLedgerService;

#[derive(Debug, Deserialize)]
pub struct ConsultationCheckQuery {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::Conflict(msg) => AppError::Conflict(msg),
        SchedulingError::InvalidStateTransition { from, to } => AppError::Conflict(format!(
            "Invalid status transition: {} -> {}",
            from, to
        )),
        SchedulingError::Validation(msg) => AppError::ValidationError(msg),
        SchedulingError::Unauthorized(msg) => AppError::Auth(msg),
        SchedulingError::StorageTimeout => {
            AppError::Timeout("Appointment store timed out".to_string())
        }
        SchedulingError::Database(msg) => AppError::Database(msg),
    }
}

/// Book an appointment. Patients book for themselves; admins may book on a
/// patient's behalf.
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let ledger = AppointmentLedgerService::new(&state);

    let outcome = ledger
        .create(request, &user, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "notification_warning": outcome.notification_warning,
        "message": "Appointment requested"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ledger = AppointmentLedgerService::new(&state);

    let appointment = ledger
        .get(appointment_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    let is_participant = user.id == appointment.patient_id.to_string()
        || user.id == appointment.doctor_id.to_string();
    if !is_participant && !user.is_admin() {
        return Err(AppError::Auth(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// List the caller's appointments, newest slot first.
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(filters): Query<AppointmentFilters>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let role = user.role.as_deref().unwrap_or("patient");
    let ledger = AppointmentLedgerService::new(&state);

    let appointments = ledger
        .list_for(&user.id, role, &filters, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "count": appointments.len()
    })))
}

/// Drive a lifecycle transition: approve, cancel or complete.
#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let ledger = AppointmentLedgerService::new(&state);

    let outcome = ledger
        .update_status(appointment_id, request, &user, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "notification_warning": outcome.notification_warning,
        "message": "Appointment status updated"
    })))
}

/// Consultation gate for prescription issuance: has this doctor-patient pair
/// a qualifying appointment record?
#[axum::debug_handler]
pub async fn check_consultation(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ConsultationCheckQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let is_own_check = user.is_doctor() && user.id == query.doctor_id.to_string();
    if !is_own_check && !user.is_admin() {
        return Err(AppError::Auth(
            "Only the prescribing doctor may run a consultation check".to_string(),
        ));
    }

    let supabase = Arc::new(SupabaseClient::new(&state));
    let authorizer = ConsultationAuthorizer::new(supabase);

    let response = authorizer
        .has_consulted(query.doctor_id, query.patient_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "has_consulted": response.has_consulted,
        "message": response.message
    })))
}
