use chrono::NaiveTime;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::parse_slot_label;
use shared_config::AppConfig;
use shared_database::{is_conflict_error, is_timeout_error, SupabaseClient};
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentFilters, AppointmentStatus, CreateAppointmentRequest,
    NotificationEvent, SchedulingError, SchedulingOutcome, UpdateStatusRequest,
};
use crate::services::conflict::ConflictChecker;
use crate::services::lifecycle::LifecycleService;
use crate::services::notify::NotificationService;

/// Appointment Ledger: single source of truth for the appointment lifecycle.
/// Creation runs through conflict admission, every mutation through the state
/// machine, and every transition emits exactly one notification before the
/// operation returns.
pub struct AppointmentLedgerService {
    supabase: Arc<SupabaseClient>,
    conflict: ConflictChecker,
    lifecycle: LifecycleService,
    notifier: NotificationService,
}

impl AppointmentLedgerService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let conflict = ConflictChecker::new(Arc::clone(&supabase));
        let notifier = NotificationService::new(Arc::clone(&supabase));

        Self {
            conflict,
            notifier,
            lifecycle: LifecycleService::new(),
            supabase,
        }
    }

    /// Book a new appointment. The request enters through the conflict checker;
    /// on success a `pending` record is persisted and the doctor is notified.
    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
        actor: &User,
        auth_token: &str,
    ) -> Result<SchedulingOutcome, SchedulingError> {
        info!(
            "Booking appointment for patient {} with doctor {} on {} at {}",
            request.patient_id, request.doctor_id, request.date, request.time
        );

        let is_own_booking = actor.id == request.patient_id.to_string();
        if !is_own_booking && !actor.is_admin() {
            return Err(SchedulingError::Unauthorized(
                "Patients can only book appointments for themselves".to_string(),
            ));
        }

        if parse_slot_label(&request.time).is_none() {
            return Err(SchedulingError::Validation(format!(
                "Invalid slot label: {}",
                request.time
            )));
        }

        self.conflict
            .check_slot(request.doctor_id, request.date, &request.time, auth_token)
            .await?;

        let row = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "date": request.date,
            "time": request.time,
            "appointment_type": request.appointment_type,
            "status": AppointmentStatus::Pending,
            "notes": request.notes,
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        // The appointments table carries a partial unique index over open
        // statuses on (doctor_id, date, time); a 409 here means another
        // request won the slot between check and insert.
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(row),
                Some(headers),
            )
            .await
            .map_err(|e| {
                if is_conflict_error(&e) {
                    SchedulingError::Conflict(
                        "Appointment slot was just taken, please choose another time"
                            .to_string(),
                    )
                } else {
                    self.map_storage_error(e)
                }
            })?;

        let appointment = parse_single(result)?;

        info!("Appointment {} booked as pending", appointment.id);

        let notification_warning = self
            .notifier
            .emit(
                NotificationEvent::Requested,
                &appointment,
                appointment.doctor_id,
                auth_token,
            )
            .await;

        Ok(SchedulingOutcome {
            appointment,
            notification_warning,
        })
    }

    /// Fetch a single appointment or fail with NotFound.
    pub async fn get(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", appointment_id);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| self.map_storage_error(e))?;

        if result.is_empty() {
            return Err(SchedulingError::NotFound);
        }

        parse_single(result)
    }

    /// Drive a status transition through the state machine and persist it.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
        actor: &User,
        auth_token: &str,
    ) -> Result<SchedulingOutcome, SchedulingError> {
        let next = request.status.ok_or_else(|| {
            SchedulingError::Validation("Missing target status".to_string())
        })?;

        let current = self.get(appointment_id, auth_token).await?;

        self.authorize_transition(actor, &current, next)?;
        self.lifecycle.validate_transition(current.status, next)?;
        let (note, summary) = self.lifecycle.validate_payload(next, &request)?;

        let mut patch = serde_json::Map::new();
        patch.insert("status".to_string(), json!(next));
        if let Some(note) = &note {
            patch.insert("note".to_string(), json!(note));
        }
        if let Some(summary) = &summary {
            patch.insert("summary".to_string(), json!(summary));
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(patch)),
                Some(headers),
            )
            .await
            .map_err(|e| self.map_storage_error(e))?;

        let appointment = parse_single(result)?;

        info!(
            "Appointment {} transitioned {} -> {}",
            appointment.id, current.status, next
        );

        let notification_warning = match NotificationEvent::for_status(next) {
            Some(event) => {
                let recipient = self.recipient_for(event, &appointment, actor);
                self.notifier
                    .emit(event, &appointment, recipient, auth_token)
                    .await
            }
            None => None,
        };

        Ok(SchedulingOutcome {
            appointment,
            notification_warning,
        })
    }

    /// All appointments where the user is patient or doctor, ordered by
    /// (date, slot time) descending. Supports status, exact-date and
    /// case-insensitive substring filters over type/notes.
    pub async fn list_for(
        &self,
        user_id: &str,
        role: &str,
        filters: &AppointmentFilters,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = match role {
            "patient" => vec![format!("patient_id=eq.{}", user_id)],
            "doctor" => vec![format!("doctor_id=eq.{}", user_id)],
            "admin" => vec![],
            other => {
                return Err(SchedulingError::Unauthorized(format!(
                    "Unknown role: {}",
                    other
                )))
            }
        };

        if let Some(status) = filters.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(date) = filters.date {
            query_parts.push(format!("date=eq.{}", date));
        }
        query_parts.push("order=date.desc,created_at.desc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| self.map_storage_error(e))?;

        let mut appointments: Vec<Appointment> = result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulingError::Database(format!("Failed to parse appointment: {}", e))
                })
            })
            .collect::<Result<_, _>>()?;

        if let Some(search) = filters.search.as_deref().map(str::to_lowercase) {
            appointments.retain(|apt| {
                // Match the type under its wire label and the spellings a
                // person would type ("follow_up", "follow up", "follow-up").
                let type_label = apt.appointment_type.to_string();
                type_label.contains(&search)
                    || type_label.replace('_', " ").contains(&search)
                    || type_label.replace('_', "-").contains(&search)
                    || apt
                        .notes
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&search))
            });
        }

        // Slot labels do not sort lexically ("02:00 PM" < "10:00 AM"), so the
        // (date, time) descending order is settled in memory.
        appointments.sort_by(|a, b| {
            (b.date, slot_sort_key(&b.time)).cmp(&(a.date, slot_sort_key(&a.time)))
        });

        debug!("Listed {} appointments for {} {}", appointments.len(), role, user_id);
        Ok(appointments)
    }

    fn authorize_transition(
        &self,
        actor: &User,
        appointment: &Appointment,
        next: AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        if actor.is_admin() {
            return Ok(());
        }

        let is_doctor = actor.id == appointment.doctor_id.to_string();
        let is_patient = actor.id == appointment.patient_id.to_string();

        match next {
            AppointmentStatus::Approved | AppointmentStatus::Completed => {
                if is_doctor {
                    Ok(())
                } else {
                    Err(SchedulingError::Unauthorized(
                        "Only the appointment's doctor may approve or complete it"
                            .to_string(),
                    ))
                }
            }
            AppointmentStatus::Cancelled => {
                if is_doctor || is_patient {
                    Ok(())
                } else {
                    Err(SchedulingError::Unauthorized(
                        "Only the appointment's participants may cancel it".to_string(),
                    ))
                }
            }
            // Moving back to pending is invalid for every caller, admins
            // included; report it as the state-machine violation it is.
            AppointmentStatus::Pending => Err(SchedulingError::InvalidStateTransition {
                from: appointment.status,
                to: next,
            }),
        }
    }

    fn recipient_for(
        &self,
        event: NotificationEvent,
        appointment: &Appointment,
        actor: &User,
    ) -> Uuid {
        match event {
            NotificationEvent::Requested => appointment.doctor_id,
            NotificationEvent::Approved | NotificationEvent::Completed => {
                appointment.patient_id
            }
            // Cancellation informs the counterparty of whoever cancelled;
            // admin-initiated cancellations inform the patient.
            NotificationEvent::Cancelled => match actor.id.parse::<Uuid>() {
                Ok(actor_id) if actor_id == appointment.patient_id => appointment.doctor_id,
                _ => appointment.patient_id,
            },
        }
    }

    fn map_storage_error(&self, err: anyhow::Error) -> SchedulingError {
        if is_timeout_error(&err) {
            warn!("Appointment store request timed out");
            SchedulingError::StorageTimeout
        } else {
            SchedulingError::Database(err.to_string())
        }
    }
}

fn parse_single(result: Vec<Value>) -> Result<Appointment, SchedulingError> {
    let row = result
        .into_iter()
        .next()
        .ok_or_else(|| SchedulingError::Database("Empty storage response".to_string()))?;

    serde_json::from_value(row)
        .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))
}

fn slot_sort_key(time: &str) -> NaiveTime {
    parse_slot_label(time).unwrap_or(NaiveTime::MIN)
}
