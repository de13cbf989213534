use tracing::{debug, warn};

use crate::models::{
    AppointmentStatus, ConsultationSummary, SchedulingError, UpdateStatusRequest,
};

/// Appointment lifecycle state machine.
///
/// pending -> {approved, cancelled}
/// approved -> {completed, cancelled}
/// completed, cancelled -> terminal
pub struct LifecycleService;

impl LifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed.
    pub fn validate_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(SchedulingError::InvalidStateTransition {
                from: current,
                to: next,
            });
        }

        Ok(())
    }

    /// All valid next statuses for a given current status.
    pub fn valid_transitions(&self, current: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Approved,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Approved => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Validate the transition payload for its target status and extract the
    /// fields the ledger persists: the doctor note and, on completion, the
    /// consultation summary.
    pub fn validate_payload(
        &self,
        next: AppointmentStatus,
        request: &UpdateStatusRequest,
    ) -> Result<(Option<String>, Option<ConsultationSummary>), SchedulingError> {
        match next {
            AppointmentStatus::Approved => Ok((request.note.clone(), None)),
            AppointmentStatus::Cancelled => {
                let reason = request
                    .reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        SchedulingError::Validation(
                            "Cancellation requires a reason".to_string(),
                        )
                    })?;
                Ok((Some(reason.to_string()), None))
            }
            AppointmentStatus::Completed => {
                let diagnosis = request
                    .diagnosis
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| {
                        SchedulingError::Validation(
                            "Completion requires a diagnosis".to_string(),
                        )
                    })?;

                let summary = ConsultationSummary {
                    diagnosis: diagnosis.to_string(),
                    recommendations: request.recommendations.clone(),
                    prescriptions: request.prescriptions.clone(),
                    follow_up: request.follow_up.clone(),
                    notes: request.notes.clone(),
                };
                Ok((request.note.clone(), Some(summary)))
            }
            AppointmentStatus::Pending => Err(SchedulingError::Validation(
                "Appointments cannot be moved back to pending".to_string(),
            )),
        }
    }
}

impl Default for LifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
