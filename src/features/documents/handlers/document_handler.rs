use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, UuidPath};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::documents::dtos::{
    is_mime_type_allowed, parse_tags_field, CreateDocumentDto, DownloadUrlDto, SearchQueryParams,
    TagsQueryParams, UpdateDocumentDto, UploadDocumentDto, UploadMetadata, VerifyChecksumDto,
    VerifyChecksumResponseDto, ALLOWED_MIME_TYPES, MAX_UPLOAD_SIZE,
};
use crate::features::documents::models::{Document, DocumentVerification};
use crate::features::documents::services::{DocumentService, UploadedFile};
use crate::shared::types::{ApiResponse, Meta};
use crate::shared::validation::is_valid_filename;

fn list_response(documents: Vec<Document>) -> Json<ApiResponse<Vec<Document>>> {
    let total = documents.len();
    Json(ApiResponse::success(
        Some(documents),
        None,
        Some(Meta::total(total)),
    ))
}

/// Create a metadata-only document
#[utoipa::path(
    post,
    path = "/documentos",
    tag = "documents",
    request_body = CreateDocumentDto,
    responses(
        (status = 201, description = "Document created", body = ApiResponse<Document>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    AppJson(dto): AppJson<CreateDocumentDto>,
) -> Result<(StatusCode, Json<ApiResponse<Document>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let document = service.create(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(document), None, None)),
    ))
}

/// Upload a document file with its metadata
///
/// Accepts multipart/form-data with:
/// - `file`: the document (required, max 50 MiB)
/// - `title` / `titulo`: defaults to the filename
/// - `description` / `contenido`
/// - `doc_type` / `tipo`
/// - `tags` / `etiquetas`: JSON array or comma separated list
#[utoipa::path(
    post,
    path = "/documentos/upload",
    tag = "documents",
    request_body(
        content = UploadDocumentDto,
        content_type = "multipart/form-data",
        description = "Document file plus optional metadata fields",
    ),
    responses(
        (status = 201, description = "Document uploaded", body = ApiResponse<Document>),
        (status = 400, description = "Invalid file or validation error"),
        (status = 401, description = "Authentication required"),
        (status = 413, description = "File too large")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Document>>)> {
    let mut file: Option<UploadedFile> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut doc_type: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "file" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let file_name = field
                .file_name()
                .map(|s| s.to_string())
                .ok_or_else(|| AppError::BadRequest("Filename is required".to_string()))?;
            let data = field.bytes().await.map_err(|e| {
                debug!("Failed to read file bytes: {}", e);
                AppError::BadRequest(format!("Failed to read file data: {}", e))
            })?;

            file = Some(UploadedFile {
                data: data.to_vec(),
                file_name,
                content_type,
            });
            continue;
        }

        let text = field.text().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read field {}: {}", field_name, e))
        })?;
        let value = Some(text.trim().to_string()).filter(|v| !v.is_empty());

        match field_name.as_str() {
            "title" | "titulo" => title = value.or(title),
            "description" | "contenido" => description = value.or(description),
            "doc_type" | "tipo" => doc_type = value.or(doc_type),
            "tags" | "etiquetas" => tags = parse_tags_field(&text)?,
            _ => debug!("Ignoring unknown field: {}", field_name),
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;

    if !is_valid_filename(&file.file_name) {
        return Err(AppError::BadRequest("Filename contains invalid characters".to_string()));
    }
    if file.data.is_empty() {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }
    if file.data.len() > MAX_UPLOAD_SIZE {
        return Err(AppError::BadRequest(format!(
            "File too large. Maximum size is {} MB",
            MAX_UPLOAD_SIZE / 1024 / 1024
        )));
    }
    if !is_mime_type_allowed(&file.content_type) {
        return Err(AppError::BadRequest(format!(
            "File type '{}' is not allowed. Allowed types: {}",
            file.content_type,
            ALLOWED_MIME_TYPES.join(", ")
        )));
    }

    let metadata = UploadMetadata {
        title: title.unwrap_or_else(|| file.file_name.clone()),
        description,
        doc_type,
        tags,
    };

    let document = service.upload(&user, file, metadata).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(document), None, None)),
    ))
}

/// List every document visible to the caller
#[utoipa::path(
    get,
    path = "/documentos",
    tag = "documents",
    responses(
        (status = 200, description = "Visible documents, newest first", body = ApiResponse<Vec<Document>>),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
) -> Result<Json<ApiResponse<Vec<Document>>>> {
    Ok(list_response(service.list(&user).await?))
}

/// List documents owned by the caller
#[utoipa::path(
    get,
    path = "/documentos/my-documents",
    tag = "documents",
    responses(
        (status = 200, description = "Owned documents, newest first", body = ApiResponse<Vec<Document>>),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_documents(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
) -> Result<Json<ApiResponse<Vec<Document>>>> {
    Ok(list_response(service.list_owned(&user).await?))
}

/// Find documents carrying any of the given tags
#[utoipa::path(
    get,
    path = "/documentos/tags",
    tag = "documents",
    params(TagsQueryParams),
    responses(
        (status = 200, description = "Matching documents", body = ApiResponse<Vec<Document>>),
        (status = 400, description = "Tags parameter is required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn documents_by_tags(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    Query(params): Query<TagsQueryParams>,
) -> Result<Json<ApiResponse<Vec<Document>>>> {
    let tags = params.tag_list()?;
    Ok(list_response(service.find_by_tags(&user, &tags).await?))
}

/// Search documents by title or description
#[utoipa::path(
    get,
    path = "/documentos/search",
    tag = "documents",
    params(SearchQueryParams),
    responses(
        (status = 200, description = "Matching documents", body = ApiResponse<Vec<Document>>),
        (status = 400, description = "Query too short")
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_documents(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<ApiResponse<Vec<Document>>>> {
    Ok(list_response(
        service.search(&user, params.q.as_deref()).await?,
    ))
}

/// Get one document
#[utoipa::path(
    get,
    path = "/documentos/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document", body = ApiResponse<Document>),
        (status = 400, description = "Invalid ID"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    UuidPath(id): UuidPath,
) -> Result<Json<ApiResponse<Document>>> {
    let document = service.get(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(document), None, None)))
}

/// Update document metadata (owner only)
#[utoipa::path(
    patch,
    path = "/documentos/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = UpdateDocumentDto,
    responses(
        (status = 200, description = "Document updated", body = ApiResponse<Document>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    UuidPath(id): UuidPath,
    AppJson(dto): AppJson<UpdateDocumentDto>,
) -> Result<Json<ApiResponse<Document>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if dto.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let document = service.update(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(document),
        Some("Document updated successfully".to_string()),
        None,
    )))
}

/// Delete a document and its stored file (owner only)
#[utoipa::path(
    delete,
    path = "/documentos/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    UuidPath(id): UuidPath,
) -> Result<StatusCode> {
    service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get a time-limited download URL
#[utoipa::path(
    get,
    path = "/documentos/{id}/download",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Signed download URL", body = ApiResponse<DownloadUrlDto>),
        (status = 403, description = "No access to this document"),
        (status = 404, description = "Document or file not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    UuidPath(id): UuidPath,
) -> Result<Json<ApiResponse<DownloadUrlDto>>> {
    let download = service.download_url(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(download), None, None)))
}

/// Verify a document against a client-computed SHA-256 checksum
#[utoipa::path(
    post,
    path = "/documentos/{id}/verify",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = VerifyChecksumDto,
    responses(
        (status = 200, description = "Verification result", body = ApiResponse<VerifyChecksumResponseDto>),
        (status = 400, description = "Malformed checksum"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    UuidPath(id): UuidPath,
    AppJson(dto): AppJson<VerifyChecksumDto>,
) -> Result<Json<ApiResponse<VerifyChecksumResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let result = service.verify_checksum(&user, id, &dto.checksum).await?;
    Ok(Json(ApiResponse::success(Some(result), None, None)))
}

/// Verification history of a document (owner or auditors)
#[utoipa::path(
    get,
    path = "/documentos/{id}/verifications",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Verification runs, newest first", body = ApiResponse<Vec<DocumentVerification>>),
        (status = 403, description = "No access to the history"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_verifications(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    UuidPath(id): UuidPath,
) -> Result<Json<ApiResponse<Vec<DocumentVerification>>>> {
    let runs = service.verifications(&user, id).await?;
    let total = runs.len();
    Ok(Json(ApiResponse::success(
        Some(runs),
        None,
        Some(Meta::total(total)),
    )))
}
