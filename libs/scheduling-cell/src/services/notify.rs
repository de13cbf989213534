use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Appointment, NotificationEvent};

/// Emission must not block the primary operation indefinitely.
const EMIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Notification Emitter: publishes one event per status transition to the
/// notification store, synchronously before the transition's operation
/// returns. Delivery is best-effort; a failure is reported to the caller as a
/// non-fatal warning and never rolls the transition back.
pub struct NotificationService {
    supabase: Arc<SupabaseClient>,
}

impl NotificationService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Emit an event for `appointment` to `recipient_id`. Returns a warning
    /// message on failure instead of an error.
    pub async fn emit(
        &self,
        event: NotificationEvent,
        appointment: &Appointment,
        recipient_id: Uuid,
        auth_token: &str,
    ) -> Option<String> {
        debug!(
            "Emitting {} for appointment {} to user {}",
            event, appointment.id, recipient_id
        );

        let body = json!({
            "recipient_id": recipient_id,
            "event": event.to_string(),
            "appointment_id": appointment.id,
            "message": self.message_for(event, appointment),
            "created_at": Utc::now().to_rfc3339(),
        });

        // Successful inserts answer 201 with an empty body under
        // return=minimal; only the status matters here.
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=minimal"),
        );

        let request = self.supabase.request_no_content(
            Method::POST,
            "/rest/v1/notifications",
            Some(auth_token),
            Some(body),
            Some(headers),
        );

        match tokio::time::timeout(EMIT_TIMEOUT, request).await {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!(
                    "Notification delivery failed for appointment {}: {}",
                    appointment.id, e
                );
                Some(format!("Notification delivery failed: {}", e))
            }
            Err(_) => {
                warn!(
                    "Notification delivery timed out for appointment {}",
                    appointment.id
                );
                Some("Notification delivery timed out".to_string())
            }
        }
    }

    fn message_for(&self, event: NotificationEvent, appointment: &Appointment) -> String {
        match event {
            NotificationEvent::Requested => format!(
                "New appointment request for {} at {}",
                appointment.date, appointment.time
            ),
            NotificationEvent::Approved => format!(
                "Your appointment on {} at {} was approved",
                appointment.date, appointment.time
            ),
            NotificationEvent::Cancelled => format!(
                "The appointment on {} at {} was cancelled",
                appointment.date, appointment.time
            ),
            NotificationEvent::Completed => format!(
                "Your appointment on {} at {} was completed",
                appointment.date, appointment.time
            ),
        }
    }
}
