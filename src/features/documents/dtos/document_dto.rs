use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::shared::validation::{validate_tags, SHA256_HEX_REGEX};

/// Maximum upload size (50 MiB)
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// MIME types accepted by the upload endpoint
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/csv",
    "application/json",
    "application/zip",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

pub fn is_mime_type_allowed(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    ALLOWED_MIME_TYPES.contains(&essence.as_str())
}

/// Fallback extension when the uploaded filename has none
pub fn get_extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/vnd.ms-excel" => Some("xls"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "application/vnd.ms-powerpoint" => Some("ppt"),
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
            Some("pptx")
        }
        "text/plain" => Some("txt"),
        "text/csv" => Some("csv"),
        "application/json" => Some("json"),
        "application/zip" => Some("zip"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Request DTO for creating a metadata-only document
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDocumentDto {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 100, message = "Document type must not exceed 100 characters"))]
    pub doc_type: Option<String>,

    #[validate(
        length(max = 20, message = "At most 20 tags are allowed"),
        custom(function = "validate_tags")
    )]
    pub tags: Option<Vec<String>>,
}

/// Partial update; only the fields present are changed
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDocumentDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "Document type must not exceed 100 characters"))]
    pub doc_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(
        length(max = 20, message = "At most 20 tags are allowed"),
        custom(function = "validate_tags")
    )]
    pub tags: Option<Vec<String>>,
}

impl UpdateDocumentDto {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.doc_type.is_none()
            && self.tags.is_none()
    }
}

/// Upload form for OpenAPI documentation only; the handler reads multipart fields directly
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadDocumentDto {
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// Alias: `titulo`. Defaults to the filename
    pub title: Option<String>,
    /// Alias: `contenido`
    pub description: Option<String>,
    /// Alias: `tipo`
    pub doc_type: Option<String>,
    /// JSON array or comma separated list. Alias: `etiquetas`
    #[schema(example = "[\"legal\", \"2024\"]")]
    pub tags: Option<String>,
}

/// Text fields collected from an upload form
#[derive(Debug, Clone, Default, Validate)]
pub struct UploadMetadata {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 100, message = "Document type must not exceed 100 characters"))]
    pub doc_type: Option<String>,
    #[validate(
        length(max = 20, message = "At most 20 tags are allowed"),
        custom(function = "validate_tags")
    )]
    pub tags: Vec<String>,
}

/// Parse a tags form field: a JSON array of strings or a comma separated list
pub fn parse_tags_field(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let tags: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|_| AppError::BadRequest("Tags must be a JSON array of strings".to_string()))?
    } else {
        raw.split(',').map(String::from).collect()
    };

    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// Query params for `GET /documentos/tags`
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct TagsQueryParams {
    /// Comma separated tag list
    pub tags: Option<String>,
}

impl TagsQueryParams {
    /// Split, trim and drop empty entries; no tags at all is a 400
    pub fn tag_list(&self) -> Result<Vec<String>> {
        let tags: Vec<String> = self
            .tags
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if tags.is_empty() {
            return Err(AppError::BadRequest("Tags parameter is required".to_string()));
        }
        Ok(tags)
    }
}

/// Query params for `GET /documentos/search`
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SearchQueryParams {
    /// Matched against title and description, minimum 2 characters
    pub q: Option<String>,
}

/// Request DTO for checksum verification
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VerifyChecksumDto {
    #[validate(regex(path = *SHA256_HEX_REGEX, message = "Checksum must be 64 hexadecimal characters"))]
    pub checksum: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyChecksumResponseDto {
    pub document_id: Uuid,
    pub provided_checksum: String,
    pub is_valid: bool,
    pub message: String,
}

/// Time-limited download link
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadUrlDto {
    pub document_id: Uuid,
    pub url: String,
    /// Validity in seconds
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_allow_list() {
        assert!(is_mime_type_allowed("application/pdf"));
        assert!(is_mime_type_allowed("text/plain; charset=utf-8"));
        assert!(is_mime_type_allowed("IMAGE/PNG"));
        assert!(!is_mime_type_allowed("application/x-msdownload"));
        assert!(!is_mime_type_allowed(""));
    }

    #[test]
    fn test_parse_tags_field() {
        assert_eq!(
            parse_tags_field(r#"["legal", " 2024 ", ""]"#).unwrap(),
            vec!["legal", "2024"]
        );
        assert_eq!(parse_tags_field("a, b,,c").unwrap(), vec!["a", "b", "c"]);
        assert!(parse_tags_field("").unwrap().is_empty());
        assert!(parse_tags_field("[1, 2]").is_err());
    }

    #[test]
    fn test_tags_query_requires_values() {
        let params = TagsQueryParams {
            tags: Some(" legal , ,finance".to_string()),
        };
        assert_eq!(params.tag_list().unwrap(), vec!["legal", "finance"]);

        let blank = TagsQueryParams {
            tags: Some(" , ".to_string()),
        };
        assert!(matches!(blank.tag_list(), Err(AppError::BadRequest(_))));
        assert!(TagsQueryParams { tags: None }.tag_list().is_err());
    }

    #[test]
    fn test_create_document_validation() {
        let mut dto = CreateDocumentDto {
            title: "Contract".to_string(),
            description: None,
            doc_type: Some("contract".to_string()),
            tags: Some(vec!["legal".to_string()]),
        };
        assert!(dto.validate().is_ok());

        dto.tags = Some((0..21).map(|i| format!("t{}", i)).collect());
        assert!(dto.validate().is_err());

        dto.tags = Some(vec!["x".repeat(51)]);
        assert!(dto.validate().is_err());

        dto.tags = None;
        dto.title = String::new();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_verify_checksum_validation() {
        let ok = VerifyChecksumDto {
            checksum: "AB".repeat(32),
        };
        assert!(ok.validate().is_ok());

        let short = VerifyChecksumDto {
            checksum: "ab".to_string(),
        };
        assert!(short.validate().is_err());
    }
}
