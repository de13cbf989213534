use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AvailabilityError, SetUnavailabilityRequest, UnavailabilityQuery};
use crate::services::AvailabilityService;

fn map_availability_error(e: AvailabilityError) -> AppError {
    match e {
        AvailabilityError::InvalidSlot(slot) => {
            AppError::ValidationError(format!("Invalid slot label: {}", slot))
        }
        AvailabilityError::InvalidRange(msg) => AppError::BadRequest(msg),
        AvailabilityError::StorageTimeout => {
            AppError::Timeout("Availability store timed out".to_string())
        }
        AvailabilityError::Database(msg) => AppError::Database(msg),
    }
}

/// Doctors manage their own calendar; admins may manage any.
#[axum::debug_handler]
pub async fn set_unavailability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetUnavailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let is_own_calendar = user.is_doctor() && user.id == doctor_id.to_string();
    if !is_own_calendar && !user.is_admin() {
        return Err(AppError::Auth(
            "Not authorized to manage this doctor's availability".to_string(),
        ));
    }

    let service = AvailabilityService::new(&state);
    let entry = service
        .set_unavailability(doctor_id, request, auth.token())
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!({
        "success": true,
        "unavailability": entry
    })))
}

#[axum::debug_handler]
pub async fn get_unavailability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<UnavailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let entries = service
        .get_unavailability(doctor_id, query.from, query.to, auth.token())
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!({
        "success": true,
        "unavailability": entries
    })))
}
