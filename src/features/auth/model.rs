use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::core::error::{AppError, Result};

/// Fixed application roles stored in `user_roles`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owns and manages their own documents
    #[default]
    Owner,
    /// System administrator
    Admin,
    /// Read-only access to metadata and audit trails
    Auditor,
    /// Can only read documents shared with them
    Recipient,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::Auditor, Role::Recipient];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Auditor => "auditor",
            Role::Recipient => "recipient",
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Owner => &[
                DocumentCreate,
                DocumentReadOwn,
                DocumentUpdateOwn,
                DocumentDeleteOwn,
                DocumentShare,
                DocumentRevoke,
            ],
            Role::Admin => &[
                DocumentReadAll,
                UserCreate,
                UserReadAll,
                UserUpdateAll,
                UserDelete,
                SystemStats,
                AuditRead,
            ],
            Role::Auditor => &[DocumentReadMetadata, AuditRead, SystemStats],
            Role::Recipient => &[DocumentReadShared],
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Invalid role. Valid roles are: {}",
                    Role::ALL.map(|r| r.as_str()).join(", ")
                ))
            })
    }
}

/// Flat permission set; no hierarchy between roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Permission {
    #[serde(rename = "document:create")]
    DocumentCreate,
    #[serde(rename = "document:read:own")]
    DocumentReadOwn,
    #[serde(rename = "document:update:own")]
    DocumentUpdateOwn,
    #[serde(rename = "document:delete:own")]
    DocumentDeleteOwn,
    #[serde(rename = "document:share")]
    DocumentShare,
    #[serde(rename = "document:revoke")]
    DocumentRevoke,
    #[serde(rename = "document:read:all")]
    DocumentReadAll,
    #[serde(rename = "document:read:metadata")]
    DocumentReadMetadata,
    #[serde(rename = "document:read:shared")]
    DocumentReadShared,
    #[serde(rename = "user:create")]
    UserCreate,
    #[serde(rename = "user:read:all")]
    UserReadAll,
    #[serde(rename = "user:update:all")]
    UserUpdateAll,
    #[serde(rename = "user:delete")]
    UserDelete,
    #[serde(rename = "system:stats")]
    SystemStats,
    #[serde(rename = "audit:read")]
    AuditRead,
}

/// True iff every required permission is granted to `role`
pub fn has_permissions(role: Role, required: &[Permission]) -> bool {
    let granted = role.permissions();
    required.iter().all(|p| granted.contains(p))
}

/// Caller identity attached to the request by the auth middleware
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub role: Role,
    /// Whether a `user_roles` row existed when the request was authenticated
    #[serde(default)]
    pub role_assigned: bool,
    /// Bearer token forwarded to the BaaS so row-level security applies
    #[serde(skip)]
    pub access_token: String,
}

impl AuthenticatedUser {
    pub fn has_permissions(&self, required: &[Permission]) -> bool {
        has_permissions(self.role, required)
    }

    /// Fail with 403 unless every permission is granted
    pub fn require(&self, required: &[Permission]) -> Result<()> {
        if self.has_permissions(required) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn username(&self) -> Option<String> {
        self.metadata_str("username")
    }

    pub fn display_name(&self) -> Option<String> {
        self.metadata_str("name")
            .or_else(|| self.metadata_str("full_name"))
    }

    fn metadata_str(&self, key: &str) -> Option<String> {
        self.user_metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            id: "u1".to_string(),
            email: None,
            user_metadata: serde_json::json!({"full_name": "Ana Diaz", "username": "ana"}),
            created_at: None,
            updated_at: None,
            role,
            role_assigned: true,
            access_token: "token".to_string(),
        }
    }

    #[test]
    fn test_role_round_trip_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_permission_table() {
        assert!(has_permissions(Role::Owner, &[Permission::DocumentCreate]));
        assert!(has_permissions(
            Role::Owner,
            &[Permission::DocumentReadOwn, Permission::DocumentUpdateOwn]
        ));
        assert!(!has_permissions(Role::Owner, &[Permission::AuditRead]));

        assert!(has_permissions(Role::Admin, &[Permission::UserReadAll]));
        assert!(!has_permissions(Role::Admin, &[Permission::DocumentCreate]));

        assert!(has_permissions(
            Role::Auditor,
            &[Permission::AuditRead, Permission::SystemStats]
        ));
        assert!(!has_permissions(Role::Auditor, &[Permission::DocumentReadAll]));

        assert!(has_permissions(Role::Recipient, &[Permission::DocumentReadShared]));
        assert!(!has_permissions(Role::Recipient, &[Permission::DocumentShare]));
    }

    #[test]
    fn test_empty_requirement_always_granted() {
        for role in Role::ALL {
            assert!(has_permissions(role, &[]));
        }
    }

    #[test]
    fn test_any_missing_permission_denies() {
        assert!(!has_permissions(
            Role::Owner,
            &[Permission::DocumentCreate, Permission::AuditRead]
        ));
    }

    #[test]
    fn test_require() {
        let owner = user_with_role(Role::Owner);
        assert!(owner.require(&[Permission::DocumentShare]).is_ok());
        assert!(matches!(
            owner.require(&[Permission::AuditRead]),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_permission_serializes_with_colon_names() {
        let json = serde_json::to_string(&Permission::DocumentReadOwn).unwrap();
        assert_eq!(json, "\"document:read:own\"");
    }

    #[test]
    fn test_metadata_helpers() {
        let user = user_with_role(Role::Owner);
        assert_eq!(user.username().as_deref(), Some("ana"));
        assert_eq!(user.display_name().as_deref(), Some("Ana Diaz"));
    }
}
