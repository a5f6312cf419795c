use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Tenant the principal acts within. Set for hospital staff and doctors.
    pub hospital_id: Option<String>,
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
    pub tenant_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Hospital,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patient" | "user" => Some(Role::Patient),
            "doctor" => Some(Role::Doctor),
            "hospital" => Some(Role::Hospital),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Hospital => "hospital",
            Role::Admin => "admin",
        };
        write!(f, "{}", name)
    }
}

/// The authenticated actor behind a request, as the domain services see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
}

impl Principal {
    pub fn new(id: Uuid, role: Role, tenant_id: Option<Uuid>) -> Self {
        Self { id, role, tenant_id }
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(id, Role::Patient, None)
    }

    pub fn doctor(id: Uuid, hospital_id: Uuid) -> Self {
        Self::new(id, Role::Doctor, Some(hospital_id))
    }

    /// Hospital accounts are their own tenant.
    pub fn hospital(hospital_id: Uuid) -> Self {
        Self::new(hospital_id, Role::Hospital, Some(hospital_id))
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin, None)
    }

    /// Tenant a hospital principal operates; falls back to its own id.
    pub fn hospital_scope(&self) -> Uuid {
        self.tenant_id.unwrap_or(self.id)
    }
}

impl TryFrom<&User> for Principal {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid id".to_string()))?;

        let role = user
            .role
            .as_deref()
            .and_then(Role::parse)
            .ok_or_else(|| AppError::Auth("Token does not carry a recognised role".to_string()))?;

        let tenant_id = match user.tenant_id.as_deref() {
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map_err(|_| AppError::Auth("Token tenant is not a valid id".to_string()))?,
            ),
            None => None,
        };

        Ok(Principal { id, role, tenant_id })
    }
}
