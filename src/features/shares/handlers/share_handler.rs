use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, ClientIp, UuidPath};
use crate::features::auth::guards::RequireAdmin;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::shares::dtos::{
    parse_share_token, CleanupResultDto, CreateSecureShareDto, DocumentRecipientDto,
    IssueShareTokenDto, SearchUsersQueryParams, SecureShareCreatedDto, ShareAccessDto,
    ShareDocumentDto, SharePermissionDto, TokenRedemptionDto, UnshareDocumentDto,
    UpdateSecureShareDto, UserSearchResultDto, VerifyShareAccessDto,
};
use crate::features::shares::models::{DocumentShare, ShareToken, ShareWithDocument};
use crate::features::shares::services::ShareService;
use crate::shared::types::{ApiResponse, Meta};

fn list_response<T>(items: Vec<T>) -> Json<ApiResponse<Vec<T>>> {
    let total = items.len();
    Json(ApiResponse::success(Some(items), None, Some(Meta::total(total))))
}

/// Share a document with a specific user
#[utoipa::path(
    post,
    path = "/share/documents",
    tag = "shares",
    request_body = ShareDocumentDto,
    responses(
        (status = 201, description = "Share created or refreshed", body = ApiResponse<DocumentShare>),
        (status = 400, description = "Self share or past expiry"),
        (status = 403, description = "Not the document owner"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn share_document(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    AppJson(dto): AppJson<ShareDocumentDto>,
) -> Result<(StatusCode, Json<ApiResponse<DocumentShare>>)> {
    let share = service.share_document(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(share),
            Some("Document shared successfully".to_string()),
            None,
        )),
    ))
}

/// Stop sharing a document with a user
#[utoipa::path(
    post,
    path = "/share/documents/unshare",
    tag = "shares",
    request_body = UnshareDocumentDto,
    responses(
        (status = 200, description = "Shares deactivated"),
        (status = 403, description = "Not the document owner"),
        (status = 404, description = "No active share")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unshare_document(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    AppJson(dto): AppJson<UnshareDocumentDto>,
) -> Result<Json<ApiResponse<()>>> {
    service.unshare_document(&user, dto).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Document unshared successfully".to_string()),
        None,
    )))
}

/// Documents shared with the caller
#[utoipa::path(
    get,
    path = "/share/shared-with-me",
    tag = "shares",
    responses(
        (status = 200, description = "Active shares naming the caller", body = ApiResponse<Vec<ShareWithDocument>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn shared_with_me(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
) -> Result<Json<ApiResponse<Vec<ShareWithDocument>>>> {
    Ok(list_response(service.shared_with_me(&user).await?))
}

/// Shares created by the caller
#[utoipa::path(
    get,
    path = "/share/my-shares",
    tag = "shares",
    responses(
        (status = 200, description = "Shares created by the caller", body = ApiResponse<Vec<ShareWithDocument>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_shares(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
) -> Result<Json<ApiResponse<Vec<ShareWithDocument>>>> {
    Ok(list_response(service.my_shares(&user).await?))
}

/// Create a secure share link for one recipient
#[utoipa::path(
    post,
    path = "/share/secure/{id}",
    tag = "shares",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = CreateSecureShareDto,
    responses(
        (status = 201, description = "Share link created", body = ApiResponse<SecureShareCreatedDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not the document owner"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_secure_share(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    UuidPath(document_id): UuidPath,
    AppJson(dto): AppJson<CreateSecureShareDto>,
) -> Result<(StatusCode, Json<ApiResponse<SecureShareCreatedDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let created = service.create_secure_share(&user, document_id, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(created), None, None)),
    ))
}

/// Open a secure share link
#[utoipa::path(
    get,
    path = "/share/secure/access/{token}",
    tag = "shares",
    params(("token" = String, Path, description = "Share link token")),
    responses(
        (status = 200, description = "Shared document with download link", body = ApiResponse<ShareAccessDto>),
        (status = 403, description = "Revoked, expired or issued to another user"),
        (status = 404, description = "Share not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn access_secure_share(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<ShareAccessDto>>> {
    let token = parse_share_token(&token)?;
    let access = service.access_secure_share(&user, &token).await?;
    Ok(Json(ApiResponse::success(Some(access), None, None)))
}

/// Update a secure share (creator only)
#[utoipa::path(
    patch,
    path = "/share/secure/{id}",
    tag = "shares",
    params(("id" = Uuid, Path, description = "Share ID")),
    request_body = UpdateSecureShareDto,
    responses(
        (status = 200, description = "Share updated", body = ApiResponse<DocumentShare>),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Share not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_secure_share(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    UuidPath(share_id): UuidPath,
    AppJson(dto): AppJson<UpdateSecureShareDto>,
) -> Result<Json<ApiResponse<DocumentShare>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if dto.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let share = service.update_secure_share(&user, share_id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(share),
        Some("Share updated successfully".to_string()),
        None,
    )))
}

/// Revoke a secure share (creator only)
#[utoipa::path(
    delete,
    path = "/share/secure/{id}",
    tag = "shares",
    params(("id" = Uuid, Path, description = "Share ID")),
    responses(
        (status = 200, description = "Share revoked", body = ApiResponse<DocumentShare>),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Share not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_secure_share(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    UuidPath(share_id): UuidPath,
) -> Result<Json<ApiResponse<DocumentShare>>> {
    let share = service.revoke_secure_share(&user, share_id).await?;
    Ok(Json(ApiResponse::success(
        Some(share),
        Some("Share revoked successfully".to_string()),
        None,
    )))
}

/// Find users to share with by name or company
#[utoipa::path(
    get,
    path = "/share/search-users",
    tag = "shares",
    params(SearchUsersQueryParams),
    responses(
        (status = 200, description = "Matching users, at most 10", body = ApiResponse<UserSearchResultDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_users(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    Query(params): Query<SearchUsersQueryParams>,
) -> Result<Json<ApiResponse<UserSearchResultDto>>> {
    let result = service.search_users(&user, params.q.as_deref()).await?;
    Ok(Json(ApiResponse::success(Some(result), None, None)))
}

/// Users with active access to an owned document
#[utoipa::path(
    get,
    path = "/share/document-users/{id}",
    tag = "shares",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Recipients with profile names", body = ApiResponse<Vec<DocumentRecipientDto>>),
        (status = 403, description = "Not the document owner"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn document_users(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    UuidPath(document_id): UuidPath,
) -> Result<Json<ApiResponse<Vec<DocumentRecipientDto>>>> {
    Ok(list_response(
        service.document_users(&user, document_id).await?,
    ))
}

/// Ask the BaaS whether the caller may read a document through a share
#[utoipa::path(
    get,
    path = "/share/check-permission/{id}",
    tag = "shares",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Access decision", body = ApiResponse<SharePermissionDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_permission(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    UuidPath(document_id): UuidPath,
) -> Result<Json<ApiResponse<SharePermissionDto>>> {
    let permission = service.check_permission(&user, document_id).await?;
    Ok(Json(ApiResponse::success(Some(permission), None, None)))
}

/// Verify a share link through the BaaS procedure
#[utoipa::path(
    post,
    path = "/share/verify-access",
    tag = "shares",
    request_body = VerifyShareAccessDto,
    responses(
        (status = 200, description = "Procedure result, passed through"),
        (status = 400, description = "Validation error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_access(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    AppJson(dto): AppJson<VerifyShareAccessDto>,
) -> Result<Json<ApiResponse<Value>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let result = service.verify_access(&user, dto.share_token.trim()).await?;
    Ok(Json(ApiResponse::success(Some(result), None, None)))
}

/// Deactivate expired shares (admin only)
#[utoipa::path(
    post,
    path = "/share/cleanup-expired",
    tag = "shares",
    responses(
        (status = 200, description = "Number of shares cleaned", body = ApiResponse<CleanupResultDto>),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cleanup_expired(
    RequireAdmin(admin): RequireAdmin,
    State(service): State<Arc<ShareService>>,
) -> Result<Json<ApiResponse<CleanupResultDto>>> {
    let cleaned = service.cleanup_expired(&admin).await?;
    Ok(Json(ApiResponse::success(
        Some(CleanupResultDto { cleaned }),
        None,
        None,
    )))
}

/// Issue a legacy share token
#[utoipa::path(
    post,
    path = "/share/tokens",
    tag = "shares",
    request_body = IssueShareTokenDto,
    responses(
        (status = 201, description = "Token issued", body = ApiResponse<ShareToken>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not the document owner")
    ),
    security(("bearer_auth" = []))
)]
pub async fn issue_share_token(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    AppJson(dto): AppJson<IssueShareTokenDto>,
) -> Result<(StatusCode, Json<ApiResponse<ShareToken>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let token = service.issue_token(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(token), None, None)),
    ))
}

/// Redeem a legacy share token
#[utoipa::path(
    post,
    path = "/share/tokens/{token}/redeem",
    tag = "shares",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Document with download link", body = ApiResponse<TokenRedemptionDto>),
        (status = 403, description = "Revoked, expired, exhausted or not allowed"),
        (status = 404, description = "Token not found"),
        (status = 409, description = "Concurrent redemption")
    ),
    security(("bearer_auth" = []))
)]
pub async fn redeem_share_token(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    ClientIp(client_ip): ClientIp,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<TokenRedemptionDto>>> {
    let token = parse_share_token(&token)?;
    let redemption = service.redeem_token(&user, &token, client_ip).await?;
    Ok(Json(ApiResponse::success(Some(redemption), None, None)))
}

/// Revoke a legacy share token (issuer only)
#[utoipa::path(
    delete,
    path = "/share/tokens/{token}",
    tag = "shares",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 403, description = "Not the issuer"),
        (status = 404, description = "Token not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_share_token(
    user: AuthenticatedUser,
    State(service): State<Arc<ShareService>>,
    Path(token): Path<String>,
) -> Result<StatusCode> {
    let token = parse_share_token(&token)?;
    service.revoke_token(&user, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}
