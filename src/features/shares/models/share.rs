use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::documents::models::Document;

/// Access granted by a share; only read access exists today
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    Read,
}

/// Row of the `document_shares` table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentShare {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Owner who created the share
    pub created_by: String,
    pub shared_with_user_id: Option<String>,
    pub share_token: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub permission_level: PermissionLevel,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DocumentShare {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Active and not yet expired
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    pub fn names_recipient(&self, user_id: &str) -> bool {
        self.shared_with_user_id.as_deref() == Some(user_id)
    }
}

/// Row of the legacy `share_tokens` table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareToken {
    pub token: String,
    pub document_id: Uuid,
    pub shared_by: String,
    pub shared_with: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub used_count: i32,
    pub allowed_ips: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub is_revoked: bool,
}

impl ShareToken {
    pub fn uses_remaining(&self) -> Option<i32> {
        self.max_uses.map(|max| (max - self.used_count).max(0))
    }
}

/// Row of the `profiles` table, limited to what sharing needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub full_name: Option<String>,
    pub company: Option<String>,
}

/// Document as seen through a share; the stored checksum is withheld
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SharedDocument {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub doc_type: Option<String>,
    pub tags: Vec<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Document> for SharedDocument {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            owner_id: document.owner_id,
            title: document.title,
            description: document.description,
            doc_type: document.doc_type,
            tags: document.tags,
            mime_type: document.mime_type,
            file_size: document.file_size,
            created_at: document.created_at,
        }
    }
}

/// Embedded `documents` columns returned with share listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub title: String,
    pub owner_id: String,
    pub doc_type: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
}

/// Share row with its document embedded
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareWithDocument {
    #[serde(flatten)]
    pub share: DocumentShare,
    pub document: Option<DocumentSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn share(expires_at: Option<DateTime<Utc>>, is_active: bool) -> DocumentShare {
        DocumentShare {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            created_by: "owner-1".to_string(),
            shared_with_user_id: Some("user-2".to_string()),
            share_token: Some("ab".repeat(32)),
            title: None,
            message: None,
            permission_level: PermissionLevel::Read,
            expires_at,
            is_active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_share_liveness() {
        let now = Utc::now();
        assert!(share(None, true).is_live(now));
        assert!(share(Some(now + Duration::hours(1)), true).is_live(now));
        assert!(!share(Some(now - Duration::seconds(1)), true).is_live(now));
        assert!(!share(None, false).is_live(now));
    }

    #[test]
    fn test_share_with_document_deserializes_embed() {
        let row = json!({
            "id": Uuid::new_v4(),
            "document_id": Uuid::new_v4(),
            "created_by": "owner-1",
            "shared_with_user_id": "user-2",
            "share_token": null,
            "title": null,
            "message": null,
            "permission_level": "read",
            "expires_at": null,
            "is_active": true,
            "created_at": "2025-01-01T00:00:00Z",
            "document": {
                "id": Uuid::new_v4(),
                "title": "Lease",
                "owner_id": "owner-1",
                "doc_type": null,
                "mime_type": "application/pdf",
                "file_size": 10
            }
        });

        let parsed: ShareWithDocument = serde_json::from_value(row).unwrap();
        assert!(parsed.share.names_recipient("user-2"));
        assert_eq!(parsed.document.unwrap().title, "Lease");
    }

    #[test]
    fn test_uses_remaining() {
        let mut token: ShareToken = serde_json::from_value(json!({
            "token": "t",
            "document_id": Uuid::new_v4(),
            "shared_by": "owner-1",
            "shared_with": null,
            "expires_at": "2030-01-01T00:00:00Z",
            "max_uses": 3,
            "used_count": 1,
            "allowed_ips": null
        }))
        .unwrap();
        assert_eq!(token.uses_remaining(), Some(2));
        assert!(token.permissions.is_empty());
        assert!(!token.is_revoked);

        token.max_uses = None;
        assert_eq!(token.uses_remaining(), None);
    }
}
