use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled service visit between a senior and a specialist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub provider_id: Uuid,
    pub status: AppointmentStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub location_type: LocationType,
    pub base_price_cents: i64,
    pub travel_fee_cents: i64,
    pub travel_distance_miles: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "in-progress" => Some(AppointmentStatus::InProgress),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    Remote,
    InPerson,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Remote => "remote",
            LocationType::InPerson => "in-person",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "remote" => Some(LocationType::Remote),
            "in-person" => Some(LocationType::InPerson),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub requester_id: Uuid,
    pub provider_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub location_type: LocationType,
    pub base_price_cents: i64,
    pub travel_fee_cents: i64,
    pub travel_distance_miles: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(AppointmentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::from_str("Pending"), None);
    }

    #[test]
    fn test_location_type_serde() {
        let json = serde_json::to_string(&LocationType::InPerson).unwrap();
        assert_eq!(json, "\"in-person\"");
        assert_eq!(LocationType::from_str("remote"), Some(LocationType::Remote));
        assert_eq!(LocationType::from_str("home"), None);
    }
}
