use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day of unavailability for a doctor. Either the whole day is blocked
/// (`full_day`) or only the listed slot labels are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayUnavailability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub full_day: bool,
    #[serde(default)]
    pub slots: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl DayUnavailability {
    /// Whether a specific slot label is blocked on this day.
    pub fn blocks_slot(&self, time: &str) -> bool {
        self.full_day || self.slots.iter().any(|s| s == time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUnavailabilityRequest {
    pub date: NaiveDate,
    #[serde(default)]
    pub full_day: bool,
    #[serde(default)]
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnavailabilityQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Invalid slot label: {0}")]
    InvalidSlot(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Storage timeout")]
    StorageTimeout,

    #[error("Database error: {0}")]
    Database(String),
}

/// Parse a slot label such as "10:00 AM" into a time of day.
/// Slot labels are the one bookable appointment unit granularity.
pub fn parse_slot_label(label: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(label.trim(), "%I:%M %p").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_morning_and_afternoon_labels() {
        assert_eq!(
            parse_slot_label("10:00 AM"),
            NaiveTime::from_hms_opt(10, 0, 0)
        );
        assert_eq!(
            parse_slot_label("02:30 PM"),
            NaiveTime::from_hms_opt(14, 30, 0)
        );
        assert_eq!(
            parse_slot_label("12:00 AM"),
            NaiveTime::from_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn rejects_malformed_labels() {
        assert!(parse_slot_label("25:00 AM").is_none());
        assert!(parse_slot_label("10am").is_none());
        assert!(parse_slot_label("").is_none());
    }

    #[test]
    fn full_day_blocks_every_slot() {
        let entry = DayUnavailability {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            full_day: true,
            slots: vec![],
            updated_at: Utc::now(),
        };
        assert!(entry.blocks_slot("10:00 AM"));
        assert!(entry.blocks_slot("03:00 PM"));
    }

    #[test]
    fn slot_list_blocks_only_listed_slots() {
        let entry = DayUnavailability {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            full_day: false,
            slots: vec!["10:00 AM".to_string()],
            updated_at: Utc::now(),
        };
        assert!(entry.blocks_slot("10:00 AM"));
        assert!(!entry.blocks_slot("11:00 AM"));
    }
}
