//! API Key model for authentication.
//!
//! API keys are used to authenticate callers. They are stored in the database as SHA-256 hashes for security;
//! the raw credential only exists in memory at creation time and in the creation response.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Privilege level of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Whether a key holding `self` may call an endpoint requiring `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        match required {
            Role::User => true,
            Role::Admin => *self == Role::Admin,
        }
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
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (SERIAL)
/// - `key_hash`: SHA-256 hash of the actual API key
/// - `label`: Free-form description
/// - `role`: `user` or `admin`
/// - `rate_limit`: Requests allowed per rolling minute
/// - `created_at`, `last_used`: Timestamps
/// - `is_active`: Whether the key is currently valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub id: i32,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,

    pub label: String,

    pub role: Role,

    pub rate_limit: i32,

    pub created_at: DateTime<Utc>,

    /// Updated on every successful lookup.
    pub last_used: Option<DateTime<Utc>>,

    /// Inactive keys are rejected during authentication. This provides a way to revoke access without deleting the record.
    pub is_active: bool,
}

/// Values needed to insert a key; the database assigns `id`.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key_hash: String,
    pub label: String,
    pub role: Role,
    pub rate_limit: i32,
    pub created_at: DateTime<Utc>,
}

/// What authentication resolves a credential to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIdentity {
    pub id: i32,
    pub key_hash: String,
    pub role: Role,
    pub rate_limit: i32,
}

impl From<&ApiKeyRecord> for KeyIdentity {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            id: record.id,
            key_hash: record.key_hash.clone(),
            role: record.role,
            rate_limit: record.rate_limit,
        }
    }
}

/// Request body for creating a new API key.
///
/// # JSON Example
///
/// ```json
/// {
///   "label": "reporting job",
///   "role": "user",
///   "rate_limit": 60
/// }
/// ```
///
/// Every field is optional: `label` defaults to "unnamed", `role` to "user",
/// `rate_limit` to the configured default.
#[derive(Debug, Default, Deserialize)]
pub struct CreateKeyRequest {
    pub label: Option<String>,
    pub role: Option<String>,
    pub rate_limit: Option<i32>,
}

/// Response for `POST /admin/keys/create`.
///
/// `api_key` is the raw credential. It is returned here once and can never be
/// retrieved again.
#[derive(Debug, Serialize)]
pub struct CreatedKeyResponse {
    pub id: i32,
    pub api_key: String,
    pub label: String,
    pub role: Role,
    pub rate_limit: i32,
}

/// Key metadata as listed to admins. Never carries the credential or its hash.
///
/// ```json
/// {
///   "id": 1,
///   "label": "master-admin",
///   "role": "admin",
///   "rate_limit": 999,
///   "is_active": true,
///   "created_at": "2025-12-20T10:00:00Z",
///   "last_used": null
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: i32,
    pub label: String,
    pub role: Role,
    pub rate_limit: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl From<ApiKeyRecord> for ApiKeyResponse {
    fn from(record: ApiKeyRecord) -> Self {
        Self {
            id: record.id,
            label: record.label,
            role: record.role,
            rate_limit: record.rate_limit,
            is_active: record.is_active,
            created_at: record.created_at,
            last_used: record.last_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values_only() {
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn admin_satisfies_every_requirement() {
        assert!(Role::Admin.satisfies(Role::Admin));
        assert!(Role::Admin.satisfies(Role::User));
        assert!(Role::User.satisfies(Role::User));
        assert!(!Role::User.satisfies(Role::Admin));
    }

    #[test]
    fn listed_metadata_has_no_hash() {
        let record = ApiKeyRecord {
            id: 7,
            key_hash: "ab".repeat(32),
            label: "ops".to_string(),
            role: Role::User,
            rate_limit: 10,
            created_at: Utc::now(),
            last_used: None,
            is_active: true,
        };

        let json = serde_json::to_value(ApiKeyResponse::from(record)).unwrap();

        assert!(json.get("key_hash").is_none());
        assert_eq!(json["role"], "user");
        assert!(json["last_used"].is_null());
    }
}
