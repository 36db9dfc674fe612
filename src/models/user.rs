//! User and session models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::common::{flag, lenient_string};

/// The three kinds of account the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Driver,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Driver, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }

    /// Root path of this role's area, e.g. `/driver`.
    pub fn home_path(&self) -> String {
        format!("/{}", self.as_str())
    }

    /// Label used when a page inside the role's area has no title of its own.
    pub fn panel_label(&self) -> &'static str {
        match self {
            Role::Student => "Student Panel",
            Role::Driver => "Driver Panel",
            Role::Admin => "Admin Panel",
        }
    }

    /// Match a path segment against the role names.
    pub fn from_segment(segment: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.as_str() == segment)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_segment(&s.to_lowercase()).ok_or_else(|| format!("Unknown user type: {}", s))
    }
}

/// Academic and emergency-contact details held for students.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropoff_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
}

/// License and vehicle details held for drivers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// Role-specific payload, tagged on the wire by `user_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "lowercase")]
pub enum RoleProfile {
    Student(StudentProfile),
    Driver(DriverProfile),
    Admin,
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Student(_) => Role::Student,
            RoleProfile::Driver(_) => Role::Driver,
            RoleProfile::Admin => Role::Admin,
        }
    }
}

/// Where an account stands in the verify-then-approve pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountStatus {
    Unverified,
    PendingApproval,
    Active,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Unverified => "unverified",
            AccountStatus::PendingApproval => "pending",
            AccountStatus::Active => "approved",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unverified" => Ok(AccountStatus::Unverified),
            "pending" => Ok(AccountStatus::PendingApproval),
            "approved" | "active" => Ok(AccountStatus::Active),
            _ => Err(format!("Unknown account status: {}", s)),
        }
    }
}

/// A user record as the backend returns it (password hash already stripped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(default, deserialize_with = "flag")]
    pub is_verified: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub profile: RoleProfile,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn status(&self) -> AccountStatus {
        if !self.is_verified {
            AccountStatus::Unverified
        } else if !self.is_approved {
            AccountStatus::PendingApproval
        } else {
            AccountStatus::Active
        }
    }

    /// Return a copy with `partial`'s fields laid over this record.
    ///
    /// Fields absent from `partial` keep their current value.
    pub fn merged(&self, partial: &Map<String, Value>) -> Result<User, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            for (key, field) in partial {
                map.insert(key.clone(), field.clone());
            }
        }
        serde_json::from_value(value)
    }
}

/// The persisted identity of whoever is logged in.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub user_type: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email_sent: Option<bool>,
}

/// Envelope carrying a single user, as returned by `/api/auth/me`,
/// `/api/auth/update-profile` and `/api/admin/user/:id`.
#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

/// Plain `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenValidity {
    #[serde(default)]
    pub valid: bool,
}
