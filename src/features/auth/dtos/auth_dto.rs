use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::features::auth::roles::UserRoleRow;
use crate::modules::supabase::{BaasUser, Session};
use crate::shared::validation::USERNAME_REGEX;

/// Request DTO for user login
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequestDto {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

impl LoginRequestDto {
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self
    }
}

/// Request DTO for user registration
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequestDto {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(length(min = 6, max = 50, message = "Password must be 6-50 characters"))]
    pub password: String,

    #[validate(
        length(min = 3, max = 30, message = "Username must be 3-30 characters"),
        regex(path = *USERNAME_REGEX, message = "Username may only contain lowercase letters, digits and underscores")
    )]
    pub username: String,

    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
}

impl RegisterRequestDto {
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self.username = self.username.trim().to_lowercase();
        self.name = self.name.trim().to_string();
        self
    }
}

/// Request DTO for token refresh; falls back to the refresh cookie when omitted
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshTokenRequestDto {
    #[validate(length(min = 1, message = "Refresh token must not be empty"))]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequestDto {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,
}

impl ForgotPasswordRequestDto {
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self
    }
}

/// Request DTO for assigning a role (admin only)
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AssignRoleRequestDto {
    #[serde(alias = "userId")]
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,

    /// One of: owner, admin, auditor, recipient
    #[schema(example = "auditor")]
    pub role: String,
}

/// User info included in auth responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthUserDto {
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub email_confirmed: bool,
}

impl AuthUserDto {
    pub fn from_baas(user: &BaasUser, role: Role) -> Self {
        let meta = |key: &str| {
            user.user_metadata
                .get(key)
                .and_then(|v| v.as_str())
                .map(String::from)
        };

        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            username: meta("username"),
            name: meta("name").or_else(|| meta("full_name")),
            role,
            created_at: user.created_at,
            updated_at: user.updated_at.or(user.created_at),
            email_confirmed: user.email_confirmed_at.is_some(),
        }
    }
}

/// Session tokens returned to API clients that do not use cookies
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionDto {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub expires_in: i64,
}

impl From<&Session> for SessionDto {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at.unwrap_or(0),
            expires_in: if session.expires_in > 0 {
                session.expires_in
            } else {
                3600
            },
        }
    }
}

/// Response DTO for login, register and refresh
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponseDto {
    pub user: AuthUserDto,
    /// Absent after registration when email confirmation is pending
    pub session: Option<SessionDto>,
}

/// Role assignment state reported by /auth/me
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    PendingRoleAssignment,
}

/// DTO for /auth/me response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponseDto {
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<AuthenticatedUser> for MeResponseDto {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            username: user.username(),
            name: user.display_name(),
            status: if user.role_assigned {
                AccountStatus::Active
            } else {
                AccountStatus::PendingRoleAssignment
            },
            id: user.id,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleAssignmentDto {
    pub user_id: String,
    pub role: Role,
}

/// A user as listed by the admin endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminUserDto {
    pub id: String,
    pub role: Role,
    pub role_assigned_at: Option<DateTime<Utc>>,
    pub role_updated_at: Option<DateTime<Utc>>,
    pub is_current_user: bool,
}

impl AdminUserDto {
    pub fn from_row(row: UserRoleRow, current_user_id: &str) -> Self {
        Self {
            is_current_user: row.user_id == current_user_id,
            id: row.user_id,
            role: row.role,
            role_assigned_at: row.created_at,
            role_updated_at: row.updated_at,
        }
    }
}
