use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// Row of the `documents` table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub doc_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Absent for metadata-only documents
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub file_path: Option<String>,
    pub checksum_sha256: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

/// Outcome recorded for a checksum verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Failed,
}

/// Row of the `document_verifications` audit table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentVerification {
    pub id: Uuid,
    pub document_id: Uuid,
    pub run_by: String,
    pub status: VerificationStatus,
    pub integrity_pct: i32,
    pub hash_checked: bool,
    #[serde(default)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
}
