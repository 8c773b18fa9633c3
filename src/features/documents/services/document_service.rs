use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, Permission};
use crate::features::documents::dtos::{
    get_extension_from_content_type, CreateDocumentDto, DownloadUrlDto, UpdateDocumentDto,
    UploadMetadata, VerifyChecksumResponseDto,
};
use crate::features::documents::models::{Document, DocumentVerification, VerificationStatus};
use crate::modules::supabase::{Auth, Query, SupabaseClient};
use crate::shared::constants::{
    TABLE_DOCUMENTS, TABLE_DOCUMENT_SHARES, TABLE_DOCUMENT_VERIFICATIONS,
};
use crate::shared::validation::{file_extension, sanitize_text, strip_filter_syntax};

/// Minimum length of a non-empty search term
pub const MIN_SEARCH_CHARS: usize = 2;

/// A file received by the upload endpoint
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Storage object path for an upload: `{owner}/{uuid}.{ext}`
pub fn storage_path(owner_id: &str, file_id: Uuid, file_name: &str, content_type: &str) -> String {
    let extension = file_extension(file_name)
        .or_else(|| get_extension_from_content_type(content_type).map(String::from))
        .unwrap_or_else(|| "bin".to_string());
    format!("{}/{}.{}", owner_id, file_id, extension)
}

/// Document CRUD, upload and integrity checks against the BaaS tables
///
/// Every call carries the caller's access token so row-level security applies.
/// Ownership is additionally checked here before mutating anything.
pub struct DocumentService {
    client: Arc<SupabaseClient>,
}

impl DocumentService {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        dto: CreateDocumentDto,
    ) -> Result<Document> {
        let now = Utc::now();
        let body = json!({
            "owner_id": user.id,
            "title": sanitize_text(&dto.title),
            "description": dto.description.as_deref().map(sanitize_text),
            "doc_type": dto.doc_type,
            "tags": dto.tags.unwrap_or_default(),
            "created_at": now,
            "updated_at": now,
        });

        let document: Document = self
            .client
            .insert(Auth::User(&user.access_token), TABLE_DOCUMENTS, &body)
            .await?;

        info!("Document {} created by {}", document.id, user.id);
        Ok(document)
    }

    /// Store the file, then insert its row; the object is removed again if the insert fails
    pub async fn upload(
        &self,
        user: &AuthenticatedUser,
        file: UploadedFile,
        metadata: UploadMetadata,
    ) -> Result<Document> {
        metadata
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let auth = Auth::User(&user.access_token);
        let checksum = sha256_hex(&file.data);
        let file_size = file.data.len() as i64;
        let path = storage_path(&user.id, Uuid::new_v4(), &file.file_name, &file.content_type);

        self.client
            .upload(auth, &path, file.data, &file.content_type)
            .await?;
        debug!("Stored {} as {}", file.file_name, path);

        let now = Utc::now();
        let body = json!({
            "owner_id": user.id,
            "title": sanitize_text(&metadata.title),
            "description": metadata.description.as_deref().map(sanitize_text),
            "doc_type": metadata.doc_type,
            "tags": metadata.tags,
            "mime_type": file.content_type,
            "file_size": file_size,
            "file_path": path,
            "checksum_sha256": checksum,
            "created_at": now,
            "updated_at": now,
        });

        match self
            .client
            .insert::<Document, _>(auth, TABLE_DOCUMENTS, &body)
            .await
        {
            Ok(document) => {
                info!(
                    "Document {} uploaded by {} ({} bytes)",
                    document.id, user.id, file_size
                );
                Ok(document)
            }
            Err(e) => {
                warn!("Document insert failed, removing stored object {}", path);
                if let Err(cleanup) = self.client.remove(auth, &[path.clone()]).await {
                    warn!("Failed to remove orphaned object {}: {}", path, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Every document visible to the caller, newest first
    pub async fn list(&self, user: &AuthenticatedUser) -> Result<Vec<Document>> {
        self.client
            .select(
                Auth::User(&user.access_token),
                TABLE_DOCUMENTS,
                &Query::new().select("*").order("created_at", false),
            )
            .await
    }

    pub async fn list_owned(&self, user: &AuthenticatedUser) -> Result<Vec<Document>> {
        self.client
            .select(
                Auth::User(&user.access_token),
                TABLE_DOCUMENTS,
                &Query::new()
                    .select("*")
                    .eq("owner_id", &user.id)
                    .order("created_at", false),
            )
            .await
    }

    /// Documents sharing at least one tag with `tags`
    pub async fn find_by_tags(
        &self,
        user: &AuthenticatedUser,
        tags: &[String],
    ) -> Result<Vec<Document>> {
        self.client
            .select(
                Auth::User(&user.access_token),
                TABLE_DOCUMENTS,
                &Query::new()
                    .select("*")
                    .overlaps("tags", tags)
                    .order("created_at", false),
            )
            .await
    }

    /// Case-insensitive match on title or description; a blank query lists everything
    pub async fn search(&self, user: &AuthenticatedUser, q: Option<&str>) -> Result<Vec<Document>> {
        let term = strip_filter_syntax(q.unwrap_or(""));
        if term.is_empty() {
            return self.list(user).await;
        }
        if term.chars().count() < MIN_SEARCH_CHARS {
            return Err(AppError::Validation(format!(
                "Search query must be at least {} characters",
                MIN_SEARCH_CHARS
            )));
        }

        let conditions = vec![
            format!("title.ilike.*{}*", term),
            format!("description.ilike.*{}*", term),
        ];
        self.client
            .select(
                Auth::User(&user.access_token),
                TABLE_DOCUMENTS,
                &Query::new()
                    .select("*")
                    .or(&conditions)
                    .order("created_at", false),
            )
            .await
    }

    pub async fn get(&self, user: &AuthenticatedUser, id: Uuid) -> Result<Document> {
        self.client
            .select_optional(
                Auth::User(&user.access_token),
                TABLE_DOCUMENTS,
                &Query::new().select("*").eq("id", id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document with ID {} not found", id)))
    }

    /// Load a document and fail with 403 unless the caller owns it
    pub async fn get_owned(&self, user: &AuthenticatedUser, id: Uuid) -> Result<Document> {
        let document = self.get(user, id).await?;
        if !document.is_owned_by(&user.id) {
            return Err(AppError::Forbidden(
                "Only the document owner can perform this action".to_string(),
            ));
        }
        Ok(document)
    }

    pub async fn update(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
        dto: UpdateDocumentDto,
    ) -> Result<Document> {
        self.get_owned(user, id).await?;

        let mut body = serde_json::to_value(&dto)
            .map_err(|e| AppError::Internal(format!("Failed to encode update: {}", e)))?;
        if let Value::Object(map) = &mut body {
            if let Some(Value::String(title)) = map.get_mut("title") {
                *title = sanitize_text(title);
            }
            if let Some(Value::String(description)) = map.get_mut("description") {
                *description = sanitize_text(description);
            }
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        let updated: Vec<Document> = self
            .client
            .update(
                Auth::User(&user.access_token),
                TABLE_DOCUMENTS,
                &Query::new().eq("id", id).eq("owner_id", &user.id),
                &body,
            )
            .await?;

        let document = updated
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Document with ID {} not found", id)))?;

        info!("Document {} updated by {}", id, user.id);
        Ok(document)
    }

    /// Delete the row, then its stored object best-effort
    pub async fn delete(&self, user: &AuthenticatedUser, id: Uuid) -> Result<()> {
        let document = self.get_owned(user, id).await?;
        let auth = Auth::User(&user.access_token);

        let deleted: Vec<Document> = self
            .client
            .delete(
                auth,
                TABLE_DOCUMENTS,
                &Query::new().eq("id", id).eq("owner_id", &user.id),
            )
            .await?;
        if deleted.is_empty() {
            return Err(AppError::NotFound(format!("Document with ID {} not found", id)));
        }

        if let Some(path) = document.file_path {
            if let Err(e) = self.client.remove(auth, &[path.clone()]).await {
                warn!("Failed to remove stored object {}: {}", path, e);
            }
        }

        info!("Document {} deleted by {}", id, user.id);
        Ok(())
    }

    /// Signed URL for the owner, an admin, or the recipient of an active share
    pub async fn download_url(&self, user: &AuthenticatedUser, id: Uuid) -> Result<DownloadUrlDto> {
        let document = self.get(user, id).await?;

        let allowed = document.is_owned_by(&user.id)
            || user.is_admin()
            || self.has_active_share(user, id).await?;
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to download this document".to_string(),
            ));
        }

        let path = document
            .file_path
            .ok_or_else(|| AppError::NotFound("Document has no stored file".to_string()))?;
        let expires_in = self.client.signed_url_expiry_secs();
        let url = self
            .client
            .create_signed_url(Auth::User(&user.access_token), &path, expires_in)
            .await?;

        Ok(DownloadUrlDto {
            document_id: id,
            url,
            expires_in,
        })
    }

    async fn has_active_share(&self, user: &AuthenticatedUser, id: Uuid) -> Result<bool> {
        let shares: Vec<Value> = self
            .client
            .select(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_SHARES,
                &Query::new()
                    .select("id,expires_at")
                    .eq("document_id", id)
                    .eq("shared_with_user_id", &user.id)
                    .eq("is_active", true),
            )
            .await?;

        let now = Utc::now();
        Ok(shares.iter().any(|share| {
            match share.get("expires_at").and_then(|v| v.as_str()) {
                Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
                    .map(|expires| expires > now)
                    .unwrap_or(false),
                None => true,
            }
        }))
    }

    /// Compare a client checksum with the stored one and record the run
    pub async fn verify_checksum(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
        checksum: &str,
    ) -> Result<VerifyChecksumResponseDto> {
        let document = self.get(user, id).await?;
        let is_valid = document
            .checksum_sha256
            .as_deref()
            .is_some_and(|stored| stored.eq_ignore_ascii_case(checksum.trim()));

        self.record_verification(user, &document, checksum, is_valid)
            .await;

        Ok(VerifyChecksumResponseDto {
            document_id: id,
            provided_checksum: checksum.to_string(),
            is_valid,
            message: if is_valid {
                "Document integrity verified".to_string()
            } else {
                "Document integrity check failed".to_string()
            },
        })
    }

    async fn record_verification(
        &self,
        user: &AuthenticatedUser,
        document: &Document,
        checksum: &str,
        is_valid: bool,
    ) {
        let (status, integrity_pct) = if is_valid {
            (VerificationStatus::Verified, 100)
        } else {
            (VerificationStatus::Failed, 0)
        };

        let body = json!({
            "document_id": document.id,
            "run_by": user.id,
            "status": status,
            "integrity_pct": integrity_pct,
            "hash_checked": document.checksum_sha256.is_some(),
            "details": {
                "algorithm": "sha256",
                "provided_checksum": checksum.to_lowercase(),
            },
            "created_at": Utc::now(),
        });

        let result: Result<Value> = self
            .client
            .insert(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_VERIFICATIONS,
                &body,
            )
            .await;
        if let Err(e) = result {
            warn!("Failed to record verification for {}: {}", document.id, e);
        }
    }

    /// Verification history, visible to the owner and audit roles
    pub async fn verifications(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<Vec<DocumentVerification>> {
        let document = self.get(user, id).await?;
        if !document.is_owned_by(&user.id) {
            user.require(&[Permission::AuditRead])?;
        }

        self.client
            .select(
                Auth::User(&user.access_token),
                TABLE_DOCUMENT_VERIFICATIONS,
                &Query::new()
                    .select("*")
                    .eq("document_id", id)
                    .order("created_at", false),
            )
            .await
    }
}
