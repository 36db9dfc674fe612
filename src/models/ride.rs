//! Ride, rating and driver summary models.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::common::flag;

/// Lifecycle state of a ride request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RideStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    /// Any status string this client does not know about.
    Other(String),
}

impl RideStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
            RideStatus::Other(s) => s,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

impl From<String> for RideStatus {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => RideStatus::Pending,
            "accepted" => RideStatus::Accepted,
            "in_progress" | "ongoing" => RideStatus::InProgress,
            "completed" => RideStatus::Completed,
            "cancelled" | "canceled" => RideStatus::Cancelled,
            _ => RideStatus::Other(s),
        }
    }
}

impl From<RideStatus> for String {
    fn from(status: RideStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::str::FromStr for RideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match RideStatus::from(s.to_string()) {
            RideStatus::Other(other) => Err(format!("Unknown ride status: {}", other)),
            status => Ok(status),
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A student travelling on a ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub student_phone: Option<String>,
    #[serde(default)]
    pub student_email: Option<String>,
}

/// A ride as listed by the student, driver and admin endpoints.
///
/// The admin ride log uses short column names (`student`, `pickup`, ...);
/// those are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: i64,
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default, alias = "pickup")]
    pub pickup_location: String,
    #[serde(default, alias = "dropoff")]
    pub dropoff_location: String,
    #[serde(default)]
    pub pickup_time: Option<String>,
    pub status: RideStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, alias = "student")]
    pub student_name: Option<String>,
    #[serde(default)]
    pub student_phone: Option<String>,
    #[serde(default, alias = "driver")]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub driver_phone: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub passengers: Vec<Passenger>,
}

impl Ride {
    /// `pickup → dropoff` for display.
    pub fn route(&self) -> String {
        format!("{} → {}", self.pickup_location, self.dropoff_location)
    }
}

#[derive(Debug, Serialize)]
pub struct RideStatusUpdate {
    pub status: RideStatus,
}

#[derive(Debug, Serialize)]
pub struct RatingRequest {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A single review left by a student for a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub ride_id: Option<i64>,
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub dropoff_location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub total_ratings: u32,
}

/// Response of `/api/admin/driver/:id/ratings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverReviews {
    #[serde(default)]
    pub ratings: Vec<Review>,
    #[serde(default)]
    pub stats: ReviewStats,
}

/// A driver row from `/api/admin/all-drivers`, with performance figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSummary {
    pub id: i64,
    #[serde(alias = "full_name")]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub vehicle_model: Option<String>,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default, deserialize_with = "flag")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_verified: bool,
    #[serde(default)]
    pub rides_completed: u32,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub total_ratings: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!(RideStatus::from("Completed".to_string()), RideStatus::Completed);
        assert_eq!(RideStatus::from("ongoing".to_string()), RideStatus::InProgress);
        assert_eq!(
            RideStatus::from("teleported".to_string()),
            RideStatus::Other("teleported".to_string())
        );
        assert!("teleported".parse::<RideStatus>().is_err());
        assert_eq!("in_progress".parse::<RideStatus>().unwrap(), RideStatus::InProgress);
    }

    #[test]
    fn test_status_serializes_as_string() {
        let v = serde_json::to_value(RideStatusUpdate {
            status: RideStatus::InProgress,
        })
        .unwrap();
        assert_eq!(v, json!({"status": "in_progress"}));
    }

    #[test]
    fn test_ride_accepts_admin_log_aliases() {
        let ride: Ride = serde_json::from_value(json!({
            "id": 3,
            "student": "Sam",
            "driver": "Dana",
            "pickup": "Library",
            "dropoff": "Dorm B",
            "status": "completed",
            "cost": 12.5
        }))
        .unwrap();
        assert_eq!(ride.student_name.as_deref(), Some("Sam"));
        assert_eq!(ride.route(), "Library → Dorm B");
        assert_eq!(ride.cost, Some(12.5));
        assert!(ride.status.is_finished());
    }

    #[test]
    fn test_driver_summary_flags() {
        let d: DriverSummary = serde_json::from_value(json!({
            "id": 1, "full_name": "Dana", "email": "d@x", "is_active": 1, "rating": 4.5
        }))
        .unwrap();
        assert_eq!(d.name, "Dana");
        assert!(d.is_active);
        assert!(!d.is_verified);
    }
}
