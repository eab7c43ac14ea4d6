use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// The scheduling role of this user, if the token carried a known one.
    pub fn actor_role(&self) -> Option<ActorRole> {
        self.role.as_deref().and_then(ActorRole::parse)
    }
}

/// Clinic roles that initiate scheduling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Assistant,
    Physician,
    Patient,
}

impl ActorRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Some(ActorRole::Admin),
            "assistant" | "receptionist" => Some(ActorRole::Assistant),
            "physician" | "doctor" => Some(ActorRole::Physician),
            "patient" => Some(ActorRole::Patient),
            _ => None,
        }
    }

    /// Admins and assistants see every appointment in the clinic.
    pub fn sees_all(&self) -> bool {
        matches!(self, ActorRole::Admin | ActorRole::Assistant)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Admin => write!(f, "admin"),
            ActorRole::Assistant => write!(f, "assistant"),
            ActorRole::Physician => write!(f, "physician"),
            ActorRole::Patient => write!(f, "patient"),
        }
    }
}
