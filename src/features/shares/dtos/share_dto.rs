use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::shares::models::{DocumentShare, PermissionLevel, SharedDocument};
use crate::shared::constants::{DEFAULT_SHARE_EXPIRY_HOURS, MAX_SHARE_EXPIRY_HOURS};
use crate::shared::validation::SHA256_HEX_REGEX;

/// Reject expiry timestamps that are not in the future
pub fn ensure_future(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<()> {
    match expires_at {
        Some(expires) if expires <= now => Err(AppError::BadRequest(
            "Expiration date must be in the future".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Share tokens are 64 hex characters; anything else cannot name a share
pub fn parse_share_token(raw: &str) -> Result<String> {
    let token = raw.trim();
    if !SHA256_HEX_REGEX.is_match(token) {
        return Err(AppError::NotFound("Share not found".to_string()));
    }
    Ok(token.to_lowercase())
}

/// Validator hook: every entry must be an IPv4 or IPv6 address
pub fn validate_ip_list(ips: &[String]) -> std::result::Result<(), validator::ValidationError> {
    if ips.iter().any(|ip| ip.trim().parse::<IpAddr>().is_err()) {
        let mut err = validator::ValidationError::new("allowed_ips");
        err.message = Some("each entry must be a valid IP address".into());
        return Err(err);
    }
    Ok(())
}

/// Request DTO for sharing a document with a specific user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareDocumentDto {
    pub document_id: Uuid,
    pub shared_with_user_id: Uuid,
    #[serde(default)]
    pub permission_level: PermissionLevel,
    /// Omit for a share without expiry
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnshareDocumentDto {
    pub document_id: Uuid,
    pub shared_with_user_id: Uuid,
}

/// Request DTO for a secure share link
///
/// `expires_at` wins over `expires_in_hours`; with neither, the link lives 24 hours.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSecureShareDto {
    pub shared_with_user_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 2000, message = "Message must not exceed 2000 characters"))]
    pub message: Option<String>,

    pub expires_at: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 8760, message = "Expiry must be between 1 and 8760 hours"))]
    pub expires_in_hours: Option<i64>,
}

impl CreateSecureShareDto {
    pub fn expiry(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if let Some(expires_at) = self.expires_at {
            ensure_future(Some(expires_at), now)?;
            return Ok(expires_at);
        }
        let hours = self
            .expires_in_hours
            .unwrap_or(DEFAULT_SHARE_EXPIRY_HOURS)
            .clamp(1, MAX_SHARE_EXPIRY_HOURS);
        Ok(now + Duration::hours(hours))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SecureShareCreatedDto {
    pub share: DocumentShare,
    /// Frontend link carrying the share token
    pub share_url: String,
}

/// Partial update of a secure share; only the fields present are changed
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSecureShareDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000, message = "Message must not exceed 2000 characters"))]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UpdateSecureShareDto {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.message.is_none()
            && self.expires_at.is_none()
            && self.is_active.is_none()
    }
}

/// Result of redeeming a secure share link
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ShareAccessDto {
    pub share: DocumentShare,
    pub document: SharedDocument,
    /// Absent for metadata-only documents
    pub download_url: Option<String>,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SearchUsersQueryParams {
    /// Name or company fragment, minimum 3 characters
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummaryDto {
    pub id: String,
    pub name: String,
    pub company: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSearchResultDto {
    pub users: Vec<UserSummaryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A user holding an active share on a document
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentRecipientDto {
    pub share_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub company: Option<String>,
    pub permission: PermissionLevel,
    pub expires_at: Option<DateTime<Utc>>,
    pub shared_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SharePermissionDto {
    pub document_id: Uuid,
    pub has_access: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VerifyShareAccessDto {
    #[validate(length(min = 1, message = "Share link value must not be empty"))]
    pub share_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupResultDto {
    pub cleaned: u64,
}

/// Request DTO for issuing a legacy share token
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct IssueShareTokenDto {
    pub document_id: Uuid,

    /// Restrict redemption to one user
    pub shared_with: Option<Uuid>,

    #[validate(range(min = 1, max = 8760, message = "Expiry must be between 1 and 8760 hours"))]
    pub expires_in_hours: Option<i64>,

    #[validate(range(min = 1, message = "Maximum uses must be at least 1"))]
    pub max_uses: Option<i32>,

    #[validate(
        length(max = 50, message = "At most 50 addresses are allowed"),
        custom(function = "validate_ip_list")
    )]
    pub allowed_ips: Option<Vec<String>>,

    /// Defaults to `["read"]`
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenRedemptionDto {
    pub document: SharedDocument,
    pub download_url: Option<String>,
    pub expires_in: u64,
    pub permissions: Vec<String>,
    /// `None` when the token has no usage cap
    pub uses_remaining: Option<i32>,
}
