use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::{is_timeout_error, SupabaseClient};

use crate::models::{ConsultationCheckResponse, ConsultationPolicy, SchedulingError};

/// Consultation Authorizer: gates prescription issuance on a prior
/// doctor-patient consultation. Read-only; performs no mutation.
pub struct ConsultationAuthorizer {
    supabase: Arc<SupabaseClient>,
    policy: ConsultationPolicy,
}

impl ConsultationAuthorizer {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            policy: ConsultationPolicy::default(),
        }
    }

    pub fn with_policy(supabase: Arc<SupabaseClient>, policy: ConsultationPolicy) -> Self {
        Self { supabase, policy }
    }

    /// Whether a qualifying appointment exists between the pair. Under the
    /// default policy any record counts, matching the shipped product
    /// behavior; the strict policy requires an approved or completed one.
    pub async fn has_consulted(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<ConsultationCheckResponse, SchedulingError> {
        debug!(
            "Consultation check for doctor {} and patient {} ({:?})",
            doctor_id, patient_id, self.policy
        );

        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&patient_id=eq.{}&limit=1",
            doctor_id, patient_id
        );
        if self.policy == ConsultationPolicy::RequireApprovedOrCompleted {
            path.push_str("&status=in.(approved,completed)");
        }

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

        let has_consulted = !result.is_empty();
        let message = if has_consulted {
            "Patient has a consultation record with this doctor".to_string()
        } else {
            "No consultation found between this doctor and patient; a consultation is required before prescribing".to_string()
        };

        Ok(ConsultationCheckResponse {
            has_consulted,
            message,
        })
    }
}
