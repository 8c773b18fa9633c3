use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::documents::models::Document;
use crate::features::shares::dtos::{
    ensure_future, CreateSecureShareDto, DocumentRecipientDto, IssueShareTokenDto,
    SecureShareCreatedDto, ShareAccessDto, ShareDocumentDto, SharePermissionDto,
    TokenRedemptionDto, UnshareDocumentDto, UpdateSecureShareDto, UserSearchResultDto,
    UserSummaryDto,
};
use crate::features::shares::models::{
    DocumentShare, PermissionLevel, Profile, ShareToken, ShareWithDocument, SharedDocument,
};
use crate::features::shares::services::access::{check_secure_share, validate_share_token};
use crate::modules::supabase::{Auth, Query, SupabaseClient};
use crate::shared::constants::{
    DEFAULT_SHARE_EXPIRY_HOURS, RPC_CHECK_SHARE_PERMISSION, RPC_CLEANUP_EXPIRED_SHARES,
    RPC_VERIFY_SHARE_ACCESS, SHARE_TOKEN_BYTES, TABLE_DOCUMENTS, TABLE_DOCUMENT_SHARES,
    TABLE_PROFILES, TABLE_SHARE_TOKENS, USER_SEARCH_LIMIT, USER_SEARCH_MIN_CHARS,
};
use crate::shared::validation::{sanitize_text, strip_filter_syntax};

const SHARE_WITH_DOCUMENT: &str = "*,document:documents(id,title,owner_id,doc_type,mime_type,file_size)";

/// Fallback display name for profiles without one
const UNNAMED_USER: &str = "User";

/// Hex-encoded random share token
pub fn generate_share_token() -> String {
    let mut bytes = [0u8; SHARE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Deserialize)]
struct DocumentOwner {
    owner_id: String,
}

#[derive(Debug, Deserialize)]
struct RecipientShareRow {
    id: Uuid,
    shared_with_user_id: String,
    #[serde(default)]
    permission_level: PermissionLevel,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

/// Sharing between users: direct shares, secure links and legacy tokens
///
/// Rows live in the BaaS; every call is made with the caller's token so
/// row-level security still applies on top of the checks done here.
pub struct ShareService {
    client: Arc<SupabaseClient>,
    frontend_url: String,
}

impl ShareService {
    pub fn new(client: Arc<SupabaseClient>, frontend_url: &str) -> Self {
        Self {
            client,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn share_url(&self, token: &str) -> String {
        format!("{}/shared/{}", self.frontend_url, token)
    }

    /// Fail with 404 when the document is missing and 403 when the caller does not own it
    async fn require_owner(&self, user: &AuthenticatedUser, document_id: Uuid) -> Result<()> {
        let document: DocumentOwner = self
            .client
            .select_optional(
                Auth::User(&user.access_token),
                TABLE_DOCUMENTS,
                &Query::new().select("owner_id").eq("id", document_id),
            )
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Document with ID {} not found", document_id))
            })?;

        if document.owner_id != user.id {
            return Err(AppError::Forbidden(
                "Only the document owner can share it".to_string(),
            ));
        }
        Ok(())
    }

    fn reject_self_share(user: &AuthenticatedUser, recipient: Uuid) -> Result<()> {
        if recipient.to_string().eq_ignore_ascii_case(&user.id) {
            return Err(AppError::BadRequest(
                "You cannot share a document with yourself".to_string(),
            ));
        }
        Ok(())
    }

    async fn load_share(&self, user: &AuthenticatedUser, share_id: Uuid) -> Result<DocumentShare> {
        self.client
            .select_optional(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &Query::new().select("*").eq("id", share_id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Share with ID {} not found", share_id)))
    }

    async fn load_document(&self, user: &AuthenticatedUser, document_id: Uuid) -> Result<Document> {
        self.client
            .select_optional(
                Auth::User(&user.access_token),
                TABLE_DOCUMENTS,
                &Query::new().select("*").eq("id", document_id),
            )
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Document with ID {} not found", document_id))
            })
    }

    async fn signed_download(
        &self,
        user: &AuthenticatedUser,
        document: &Document,
    ) -> Result<Option<String>> {
        match &document.file_path {
            Some(path) => {
                let url = self
                    .client
                    .create_signed_url(
                        Auth::User(&user.access_token),
                        path,
                        self.client.signed_url_expiry_secs(),
                    )
                    .await?;
                Ok(Some(url))
            }
            None => Ok(None),
        }
    }

    // =========================================================================
    // DIRECT SHARES
    // =========================================================================

    /// Share with a user; an existing active share for the same recipient is updated in place
    pub async fn share_document(
        &self,
        user: &AuthenticatedUser,
        dto: ShareDocumentDto,
    ) -> Result<DocumentShare> {
        let now = Utc::now();
        Self::reject_self_share(user, dto.shared_with_user_id)?;
        ensure_future(dto.expires_at, now)?;
        self.require_owner(user, dto.document_id).await?;

        let auth = Auth::User(&user.access_token);
        let recipient = dto.shared_with_user_id.to_string();

        let existing: Option<DocumentShare> = self
            .client
            .select_optional(
                auth,
                TABLE_DOCUMENT_SHARES,
                &Query::new()
                    .select("*")
                    .eq("document_id", dto.document_id)
                    .eq("shared_with_user_id", &recipient)
                    .eq("is_active", true),
            )
            .await?;

        if let Some(existing) = existing {
            let updated: Vec<DocumentShare> = self
                .client
                .update(
                    auth,
                    TABLE_DOCUMENT_SHARES,
                    &Query::new().eq("id", existing.id),
                    &json!({
                        "permission_level": dto.permission_level,
                        "expires_at": dto.expires_at,
                    }),
                )
                .await?;

            info!(
                "Share {} on document {} refreshed by {}",
                existing.id, dto.document_id, user.id
            );
            return updated
                .into_iter()
                .next()
                .ok_or_else(|| AppError::NotFound("Share not found".to_string()));
        }

        let share: DocumentShare = self
            .client
            .insert(
                auth,
                TABLE_DOCUMENT_SHARES,
                &json!({
                    "document_id": dto.document_id,
                    "created_by": user.id,
                    "shared_with_user_id": recipient,
                    "share_token": generate_share_token(),
                    "permission_level": dto.permission_level,
                    "expires_at": dto.expires_at,
                    "is_active": true,
                    "created_at": now,
                }),
            )
            .await?;

        info!(
            "Document {} shared by {} with {}",
            dto.document_id, user.id, recipient
        );
        Ok(share)
    }

    /// Deactivate every active share of a document for one recipient
    pub async fn unshare_document(
        &self,
        user: &AuthenticatedUser,
        dto: UnshareDocumentDto,
    ) -> Result<usize> {
        self.require_owner(user, dto.document_id).await?;

        let deactivated: Vec<DocumentShare> = self
            .client
            .update(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &Query::new()
                    .eq("document_id", dto.document_id)
                    .eq("shared_with_user_id", dto.shared_with_user_id)
                    .eq("is_active", true),
                &json!({ "is_active": false }),
            )
            .await?;

        if deactivated.is_empty() {
            return Err(AppError::NotFound(
                "No active share found for this user".to_string(),
            ));
        }

        info!(
            "Document {} unshared from {} by {}",
            dto.document_id, dto.shared_with_user_id, user.id
        );
        Ok(deactivated.len())
    }

    /// Active, unexpired shares naming the caller
    pub async fn shared_with_me(&self, user: &AuthenticatedUser) -> Result<Vec<ShareWithDocument>> {
        let shares: Vec<ShareWithDocument> = self
            .client
            .select(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &Query::new()
                    .select(SHARE_WITH_DOCUMENT)
                    .eq("shared_with_user_id", &user.id)
                    .eq("is_active", true)
                    .order("created_at", false),
            )
            .await?;

        let now = Utc::now();
        Ok(shares
            .into_iter()
            .filter(|entry| entry.share.is_live(now))
            .collect())
    }

    pub async fn my_shares(&self, user: &AuthenticatedUser) -> Result<Vec<ShareWithDocument>> {
        self.client
            .select(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &Query::new()
                    .select(SHARE_WITH_DOCUMENT)
                    .eq("created_by", &user.id)
                    .order("created_at", false),
            )
            .await
    }

    // =========================================================================
    // SECURE SHARE LINKS
    // =========================================================================

    pub async fn create_secure_share(
        &self,
        user: &AuthenticatedUser,
        document_id: Uuid,
        dto: CreateSecureShareDto,
    ) -> Result<SecureShareCreatedDto> {
        let now = Utc::now();
        Self::reject_self_share(user, dto.shared_with_user_id)?;
        let expires_at = dto.expiry(now)?;
        self.require_owner(user, document_id).await?;

        let token = generate_share_token();
        let share: DocumentShare = self
            .client
            .insert(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &json!({
                    "document_id": document_id,
                    "created_by": user.id,
                    "shared_with_user_id": dto.shared_with_user_id,
                    "share_token": token,
                    "title": dto.title.as_deref().map(sanitize_text),
                    "message": dto.message.as_deref().map(sanitize_text),
                    "permission_level": PermissionLevel::Read,
                    "expires_at": expires_at,
                    "is_active": true,
                    "created_at": now,
                }),
            )
            .await?;

        info!(
            "Secure share {} created for document {} by {} (expires {})",
            share.id, document_id, user.id, expires_at
        );
        Ok(SecureShareCreatedDto {
            share_url: self.share_url(&token),
            share,
        })
    }

    /// Redeem a secure link for its named recipient
    pub async fn access_secure_share(
        &self,
        user: &AuthenticatedUser,
        token: &str,
    ) -> Result<ShareAccessDto> {
        let share: DocumentShare = self
            .client
            .select_optional(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &Query::new().select("*").eq("share_token", token),
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Share not found".to_string()))?;

        if let Err(denied) = check_secure_share(&share, Utc::now(), &user.id) {
            warn!(
                "Secure share {} refused for {}: {}",
                share.id, user.id, denied
            );
            return Err(denied.into());
        }

        let document = self.load_document(user, share.document_id).await?;
        let download_url = self.signed_download(user, &document).await?;

        info!("Secure share {} accessed by {}", share.id, user.id);
        Ok(ShareAccessDto {
            share,
            document: SharedDocument::from(document),
            download_url,
            expires_in: self.client.signed_url_expiry_secs(),
        })
    }

    pub async fn update_secure_share(
        &self,
        user: &AuthenticatedUser,
        share_id: Uuid,
        dto: UpdateSecureShareDto,
    ) -> Result<DocumentShare> {
        ensure_future(dto.expires_at, Utc::now())?;

        let share = self.load_share(user, share_id).await?;
        if share.created_by != user.id {
            return Err(AppError::Forbidden(
                "Only the creator can modify this share".to_string(),
            ));
        }

        let mut body = serde_json::to_value(&dto)
            .map_err(|e| AppError::Internal(format!("Failed to encode update: {}", e)))?;
        if let Value::Object(map) = &mut body {
            for field in ["title", "message"] {
                if let Some(Value::String(text)) = map.get_mut(field) {
                    *text = sanitize_text(text);
                }
            }
        }

        let updated: Vec<DocumentShare> = self
            .client
            .update(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &Query::new().eq("id", share_id).eq("created_by", &user.id),
                &body,
            )
            .await?;

        info!("Secure share {} updated by {}", share_id, user.id);
        updated
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Share with ID {} not found", share_id)))
    }

    pub async fn revoke_secure_share(
        &self,
        user: &AuthenticatedUser,
        share_id: Uuid,
    ) -> Result<DocumentShare> {
        let share = self.load_share(user, share_id).await?;
        if share.created_by != user.id {
            return Err(AppError::Forbidden(
                "Only the creator can revoke this share".to_string(),
            ));
        }

        let revoked: Vec<DocumentShare> = self
            .client
            .update(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &Query::new().eq("id", share_id).eq("created_by", &user.id),
                &json!({ "is_active": false }),
            )
            .await?;

        info!("Secure share {} revoked by {}", share_id, user.id);
        revoked
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Share with ID {} not found", share_id)))
    }

    // =========================================================================
    // RECIPIENTS
    // =========================================================================

    /// Profiles matching a name or company fragment, never the caller
    pub async fn search_users(
        &self,
        user: &AuthenticatedUser,
        q: Option<&str>,
    ) -> Result<UserSearchResultDto> {
        let term = strip_filter_syntax(q.unwrap_or(""));
        if term.chars().count() < USER_SEARCH_MIN_CHARS {
            return Ok(UserSearchResultDto {
                users: Vec::new(),
                message: Some(format!(
                    "Type at least {} characters to search",
                    USER_SEARCH_MIN_CHARS
                )),
            });
        }

        let conditions = vec![
            format!("full_name.ilike.*{}*", term),
            format!("company.ilike.*{}*", term),
        ];
        let profiles: Vec<Profile> = self
            .client
            .select(
                Auth::User(&user.access_token),
                TABLE_PROFILES,
                &Query::new()
                    .select("user_id,full_name,company")
                    .or(&conditions)
                    .neq("user_id", &user.id)
                    .limit(USER_SEARCH_LIMIT),
            )
            .await?;

        Ok(UserSearchResultDto {
            users: profiles
                .into_iter()
                .map(|profile| UserSummaryDto {
                    id: profile.user_id,
                    name: profile
                        .full_name
                        .unwrap_or_else(|| UNNAMED_USER.to_string()),
                    company: profile.company,
                })
                .collect(),
            message: None,
        })
    }

    /// Users holding an active share on an owned document
    pub async fn document_users(
        &self,
        user: &AuthenticatedUser,
        document_id: Uuid,
    ) -> Result<Vec<DocumentRecipientDto>> {
        self.require_owner(user, document_id).await?;
        let auth = Auth::User(&user.access_token);

        let shares: Vec<RecipientShareRow> = self
            .client
            .select(
                auth,
                TABLE_DOCUMENT_SHARES,
                &Query::new()
                    .select("id,shared_with_user_id,permission_level,expires_at,created_at")
                    .eq("document_id", document_id)
                    .eq("is_active", true)
                    .not_null("shared_with_user_id"),
            )
            .await?;
        if shares.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<&str> = shares
            .iter()
            .map(|share| share.shared_with_user_id.as_str())
            .collect();
        let profiles: HashMap<String, Profile> = self
            .client
            .select::<Profile>(
                auth,
                TABLE_PROFILES,
                &Query::new()
                    .select("user_id,full_name,company")
                    .in_list("user_id", &user_ids),
            )
            .await?
            .into_iter()
            .map(|profile| (profile.user_id.clone(), profile))
            .collect();

        Ok(shares
            .into_iter()
            .map(|share| {
                let profile = profiles.get(&share.shared_with_user_id);
                DocumentRecipientDto {
                    share_id: share.id,
                    name: profile
                        .and_then(|p| p.full_name.clone())
                        .unwrap_or_else(|| UNNAMED_USER.to_string()),
                    company: profile.and_then(|p| p.company.clone()),
                    user_id: share.shared_with_user_id,
                    permission: share.permission_level,
                    expires_at: share.expires_at,
                    shared_at: share.created_at,
                }
            })
            .collect())
    }

    // =========================================================================
    // STORED PROCEDURES
    // =========================================================================

    pub async fn check_permission(
        &self,
        user: &AuthenticatedUser,
        document_id: Uuid,
    ) -> Result<SharePermissionDto> {
        let result = self
            .client
            .rpc(
                Auth::User(&user.access_token),
                RPC_CHECK_SHARE_PERMISSION,
                &json!({ "p_document_id": document_id, "p_user_id": user.id }),
            )
            .await?;

        Ok(SharePermissionDto {
            document_id,
            has_access: result.as_bool().unwrap_or(false),
        })
    }

    /// Passes the procedure's answer through untouched
    pub async fn verify_access(&self, user: &AuthenticatedUser, share_token: &str) -> Result<Value> {
        self.client
            .rpc(
                Auth::User(&user.access_token),
                RPC_VERIFY_SHARE_ACCESS,
                &json!({ "p_share_token": share_token, "p_user_id": user.id }),
            )
            .await
    }

    /// Number of shares deactivated by the cleanup procedure
    pub async fn cleanup_expired(&self, admin: &AuthenticatedUser) -> Result<u64> {
        let result = self
            .client
            .rpc(
                Auth::User(&admin.access_token),
                RPC_CLEANUP_EXPIRED_SHARES,
                &json!({}),
            )
            .await?;

        let cleaned = result
            .as_u64()
            .or_else(|| result.get("cleaned").and_then(Value::as_u64))
            .unwrap_or(0);
        info!("Expired share cleanup by {} removed {} share(s)", admin.id, cleaned);
        Ok(cleaned)
    }

    // =========================================================================
    // LEGACY SHARE TOKENS
    // =========================================================================

    pub async fn issue_token(
        &self,
        user: &AuthenticatedUser,
        dto: IssueShareTokenDto,
    ) -> Result<ShareToken> {
        self.require_owner(user, dto.document_id).await?;

        let hours = dto.expires_in_hours.unwrap_or(DEFAULT_SHARE_EXPIRY_HOURS);
        let allowed_ips = dto.allowed_ips.map(|ips| {
            ips.into_iter()
                .map(|ip| ip.trim().to_string())
                .collect::<Vec<_>>()
        });
        let permissions = dto
            .permissions
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| vec!["read".to_string()]);

        let token: ShareToken = self
            .client
            .insert(
                Auth::User(&user.access_token),
                TABLE_SHARE_TOKENS,
                &json!({
                    "token": generate_share_token(),
                    "document_id": dto.document_id,
                    "shared_by": user.id,
                    "shared_with": dto.shared_with,
                    "expires_at": Utc::now() + Duration::hours(hours),
                    "max_uses": dto.max_uses,
                    "used_count": 0,
                    "allowed_ips": allowed_ips,
                    "permissions": permissions,
                    "is_revoked": false,
                }),
            )
            .await?;

        info!(
            "Share token issued for document {} by {}",
            dto.document_id, user.id
        );
        Ok(token)
    }

    async fn load_token(&self, user: &AuthenticatedUser, token: &str) -> Result<ShareToken> {
        self.client
            .select_optional(
                Auth::User(&user.access_token),
                TABLE_SHARE_TOKENS,
                &Query::new().select("*").eq("token", token),
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Share link not found".to_string()))
    }

    /// Validate, count the use, then hand out a download link
    pub async fn redeem_token(
        &self,
        user: &AuthenticatedUser,
        token: &str,
        client_ip: Option<IpAddr>,
    ) -> Result<TokenRedemptionDto> {
        let row = self.load_token(user, token).await?;

        if let Err(denied) = validate_share_token(&row, Utc::now(), &user.id, client_ip) {
            warn!(
                "Share token for document {} refused for {} from {:?}: {}",
                row.document_id, user.id, client_ip, denied
            );
            return Err(denied.into());
        }

        // Compare-and-set on used_count
        let counted: Vec<ShareToken> = self
            .client
            .update(
                Auth::User(&user.access_token),
                TABLE_SHARE_TOKENS,
                &Query::new()
                    .eq("token", token)
                    .eq("used_count", row.used_count),
                &json!({ "used_count": row.used_count + 1 }),
            )
            .await?;
        let row = counted.into_iter().next().ok_or_else(|| {
            AppError::Conflict("Share link was used concurrently, please retry".to_string())
        })?;

        let document = self.load_document(user, row.document_id).await?;
        let download_url = self.signed_download(user, &document).await?;

        info!(
            "Share token for document {} redeemed by {}",
            row.document_id, user.id
        );
        Ok(TokenRedemptionDto {
            document: SharedDocument::from(document),
            download_url,
            expires_in: self.client.signed_url_expiry_secs(),
            uses_remaining: row.uses_remaining(),
            permissions: row.permissions,
        })
    }

    pub async fn revoke_token(&self, user: &AuthenticatedUser, token: &str) -> Result<()> {
        let row = self.load_token(user, token).await?;
        if row.shared_by != user.id {
            return Err(AppError::Forbidden(
                "Only the issuer can revoke this share link".to_string(),
            ));
        }

        let _: Vec<ShareToken> = self
            .client
            .update(
                Auth::User(&user.access_token),
                TABLE_SHARE_TOKENS,
                &Query::new().eq("token", token).eq("shared_by", &user.id),
                &json!({ "is_revoked": true }),
            )
            .await?;

        info!(
            "Share token for document {} revoked by {}",
            row.document_id, user.id
        );
        Ok(())
    }
}
