use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// The authoritative appointment record. The ledger owns this entity
/// exclusively; all mutation goes through its operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// Slot label, e.g. "10:00 AM". One bookable unit for a doctor.
    pub time: String,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    /// Patient-entered reason for the visit, set at creation.
    pub notes: Option<String>,
    /// Doctor annotation: approval note or required cancellation reason.
    pub note: Option<String>,
    /// Populated iff status is completed.
    pub summary: Option<ConsultationSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Open statuses still occupy a slot and count toward double-booking.
    pub fn is_open(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }

    /// Terminal statuses permit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[serde(alias = "initial", alias = "new_patient")]
    InitialVisit,

    #[serde(alias = "followup")]
    FollowUp,

    #[serde(alias = "general_consultation", alias = "general")]
    Consultation,

    #[serde(alias = "medication_renewal")]
    PrescriptionRenewal,

    #[serde(alias = "checkup")]
    CheckUp,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InitialVisit => write!(f, "initial_visit"),
            AppointmentType::FollowUp => write!(f, "follow_up"),
            AppointmentType::Consultation => write!(f, "consultation"),
            AppointmentType::PrescriptionRenewal => write!(f, "prescription_renewal"),
            AppointmentType::CheckUp => write!(f, "check_up"),
        }
    }
}

/// Structured outcome of a completed consultation. Only the diagnosis is
/// mandatory; everything else is at the doctor's discretion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationSummary {
    pub diagnosis: String,
    pub recommendations: Option<String>,
    pub prescriptions: Option<String>,
    pub follow_up: Option<String>,
    pub notes: Option<String>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
}

/// Payload for a status transition. Which fields are required depends on the
/// target status: `reason` on cancellation, `diagnosis` on completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<AppointmentStatus>,
    pub note: Option<String>,
    pub reason: Option<String>,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
    pub prescriptions: Option<String>,
    pub follow_up: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilters {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring match over appointment type and patient notes.
    pub search: Option<String>,
}

/// Operation result carrying the appointment plus a non-fatal notification
/// warning when emission failed. The transition itself is never rolled back
/// on emitter failure.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulingOutcome {
    pub appointment: Appointment,
    pub notification_warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationCheckResponse {
    pub has_consulted: bool,
    pub message: String,
}

/// Policy for the consultation gate. The observed product behavior counts any
/// appointment record between the pair; the strict variant requires an
/// approved or completed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsultationPolicy {
    #[default]
    AnyRecord,
    RequireApprovedOrCompleted,
}

// ==============================================================================
// NOTIFICATION MODELS (external collaborator boundary)
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    Requested,
    Approved,
    Cancelled,
    Completed,
}

impl NotificationEvent {
    pub fn for_status(status: AppointmentStatus) -> Option<Self> {
        match status {
            AppointmentStatus::Pending => Some(NotificationEvent::Requested),
            AppointmentStatus::Approved => Some(NotificationEvent::Approved),
            AppointmentStatus::Cancelled => Some(NotificationEvent::Cancelled),
            AppointmentStatus::Completed => Some(NotificationEvent::Completed),
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::Requested => write!(f, "appointment_requested"),
            NotificationEvent::Approved => write!(f, "appointment_approved"),
            NotificationEvent::Cancelled => write!(f, "appointment_cancelled"),
            NotificationEvent::Completed => write!(f, "appointment_completed"),
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Slot not available: {0}")]
    Conflict(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStateTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Storage timeout")]
    StorageTimeout,

    #[error("Database error: {0}")]
    Database(String),
}
