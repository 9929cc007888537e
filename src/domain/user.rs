use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a user's profile that billing reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub stripe_customer_id: Option<String>,
    pub membership_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Senior,
    Specialist,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Senior => "senior",
            UserRole::Specialist => "specialist",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "senior" => Some(UserRole::Senior),
            "specialist" => Some(UserRole::Specialist),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub stripe_customer_id: Option<String>,
}

/// Who is asking for a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// A signed-in user.
    User { id: Uuid, is_admin: bool },
    /// The verified provider webhook.
    System,
}

impl Actor {
    pub fn user(profile: &UserProfile) -> Self {
        Actor::User {
            id: profile.id,
            is_admin: profile.is_admin(),
        }
    }
}
