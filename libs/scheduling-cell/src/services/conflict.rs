use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::models::AvailabilityError;
use doctor_cell::services::AvailabilityService;
use shared_database::{is_timeout_error, SupabaseClient};

use crate::models::{Appointment, SchedulingError};

/// Admission control for new appointment requests: a slot is rejected when the
/// availability store blocks it or an open appointment already occupies it.
///
/// This pre-check gives precise error messages; the storage-level unique
/// constraint over open statuses on (doctor_id, date, time) is what actually
/// serializes concurrent writers (the ledger converts that 409 into a
/// conflict error).
pub struct ConflictChecker {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
}

impl ConflictChecker {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        let availability = AvailabilityService::with_client(Arc::clone(&supabase));
        Self {
            supabase,
            availability,
        }
    }

    /// Reject the slot if the doctor is unavailable or it is already booked.
    pub async fn check_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        debug!("Checking slot for doctor {} on {} at {}", doctor_id, date, time);

        if self
            .availability
            .is_slot_unavailable(doctor_id, date, time, auth_token)
            .await
            .map_err(map_availability_error)?
        {
            warn!("Doctor {} marked unavailable on {} at {}", doctor_id, date, time);
            return Err(SchedulingError::Conflict(
                "Doctor is not available at the requested time".to_string(),
            ));
        }

        let open = self
            .open_appointments_at(doctor_id, date, time, auth_token)
            .await?;

        if !open.is_empty() {
            warn!(
                "Slot already booked for doctor {} on {} at {} ({} open appointments)",
                doctor_id,
                date,
                time,
                open.len()
            );
            return Err(SchedulingError::Conflict(
                "Appointment slot is already booked".to_string(),
            ));
        }

        Ok(())
    }

    /// Open (pending or approved) appointments occupying a slot.
    pub async fn open_appointments_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&time=eq.{}&status=in.(pending,approved)",
            doctor_id,
            date,
            urlencoding::encode(time)
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| {
                if is_timeout_error(&e) {
                    SchedulingError::StorageTimeout
                } else {
                    SchedulingError::Database(e.to_string())
                }
            })?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulingError::Database(format!("Failed to parse appointment: {}", e))
                })
            })
            .collect()
    }
}

fn map_availability_error(e: AvailabilityError) -> SchedulingError {
    match e {
        AvailabilityError::StorageTimeout => SchedulingError::StorageTimeout,
        other => SchedulingError::Database(other.to_string()),
    }
}
