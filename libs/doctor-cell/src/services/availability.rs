use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{is_timeout_error, SupabaseClient};

use crate::models::{
    parse_slot_label, AvailabilityError, DayUnavailability, SetUnavailabilityRequest,
};

/// Availability Store: records and serves per-doctor, per-date unavailability.
/// The store is the single owner of availability entries; overwrites are
/// last-write-wins with no delete semantics.
pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Overwrite unavailability for a doctor on one date. Upsert on
    /// (doctor_id, date); no error on overwrite.
    pub async fn set_unavailability(
        &self,
        doctor_id: Uuid,
        request: SetUnavailabilityRequest,
        auth_token: &str,
    ) -> Result<DayUnavailability, AvailabilityError> {
        debug!(
            "Setting unavailability for doctor {} on {} (full_day: {})",
            doctor_id, request.date, request.full_day
        );

        for slot in &request.slots {
            if parse_slot_label(slot).is_none() {
                return Err(AvailabilityError::InvalidSlot(slot.clone()));
            }
        }

        let row = json!({
            "doctor_id": doctor_id,
            "date": request.date,
            "full_day": request.full_day,
            "slots": request.slots,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static(
                "return=representation,resolution=merge-duplicates",
            ),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_unavailability?on_conflict=doctor_id,date",
                Some(auth_token),
                Some(row),
                Some(headers),
            )
            .await
            .map_err(|e| self.map_storage_error(e))?;

        let entry = result
            .into_iter()
            .next()
            .ok_or_else(|| AvailabilityError::Database("Empty upsert response".to_string()))?;

        serde_json::from_value(entry)
            .map_err(|e| AvailabilityError::Database(format!("Failed to parse entry: {}", e)))
    }

    /// Unavailable entries for a date range, ordered by date ascending.
    /// Re-queried on every call; callers get no caching guarantee.
    pub async fn get_unavailability(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<DayUnavailability>, AvailabilityError> {
        if from > to {
            return Err(AvailabilityError::InvalidRange(format!(
                "{} is after {}",
                from, to
            )));
        }

        let path = format!(
            "/rest/v1/doctor_unavailability?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc",
            doctor_id, from, to
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| self.map_storage_error(e))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    AvailabilityError::Database(format!("Failed to parse entry: {}", e))
                })
            })
            .collect()
    }

    /// Whether the doctor is unavailable at (date, time). Read by the conflict
    /// checker at booking admission time.
    pub async fn is_slot_unavailable(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        auth_token: &str,
    ) -> Result<bool, AvailabilityError> {
        let entries = self.get_unavailability(doctor_id, date, date, auth_token).await?;

        let blocked = entries.iter().any(|entry| entry.blocks_slot(time));
        if blocked {
            debug!("Doctor {} unavailable on {} at {}", doctor_id, date, time);
        }

        Ok(blocked)
    }

    fn map_storage_error(&self, err: anyhow::Error) -> AvailabilityError {
        if is_timeout_error(&err) {
            warn!("Availability store request timed out");
            AvailabilityError::StorageTimeout
        } else {
            AvailabilityError::Database(err.to_string())
        }
    }
}
