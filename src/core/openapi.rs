use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth;
use crate::features::documents::{
    dtos as documents_dtos, handlers as documents_handlers, models as documents_models,
};
use crate::features::shares::{
    dtos as shares_dtos, handlers as shares_handlers, models as shares_models,
};
use crate::shared::types::{ApiResponse, ErrorResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::core::health::health_check,
        // Auth
        auth::handlers::register,
        auth::handlers::login,
        auth::handlers::refresh_token,
        auth::handlers::logout,
        auth::handlers::forgot_password,
        auth::handlers::get_me,
        auth::handlers::assign_role,
        auth::handlers::list_users,
        // Documents
        documents_handlers::create_document,
        documents_handlers::upload_document,
        documents_handlers::list_documents,
        documents_handlers::my_documents,
        documents_handlers::documents_by_tags,
        documents_handlers::search_documents,
        documents_handlers::get_document,
        documents_handlers::update_document,
        documents_handlers::delete_document,
        documents_handlers::download_document,
        documents_handlers::verify_document,
        documents_handlers::list_verifications,
        // Shares
        shares_handlers::share_document,
        shares_handlers::unshare_document,
        shares_handlers::shared_with_me,
        shares_handlers::my_shares,
        shares_handlers::create_secure_share,
        shares_handlers::access_secure_share,
        shares_handlers::update_secure_share,
        shares_handlers::revoke_secure_share,
        shares_handlers::search_users,
        shares_handlers::document_users,
        shares_handlers::check_permission,
        shares_handlers::verify_access,
        shares_handlers::cleanup_expired,
        shares_handlers::issue_share_token,
        shares_handlers::redeem_share_token,
        shares_handlers::revoke_share_token,
    ),
    components(
        schemas(
            // Shared
            Meta,
            ErrorResponse,
            // Auth
            auth::model::Role,
            auth::model::Permission,
            auth::model::AuthenticatedUser,
            auth::dtos::RegisterRequestDto,
            auth::dtos::LoginRequestDto,
            auth::dtos::RefreshTokenRequestDto,
            auth::dtos::ForgotPasswordRequestDto,
            auth::dtos::AssignRoleRequestDto,
            auth::dtos::AuthUserDto,
            auth::dtos::SessionDto,
            auth::dtos::AuthResponseDto,
            auth::dtos::AccountStatus,
            auth::dtos::MeResponseDto,
            auth::dtos::RoleAssignmentDto,
            auth::dtos::AdminUserDto,
            ApiResponse<auth::dtos::AuthResponseDto>,
            ApiResponse<auth::dtos::MeResponseDto>,
            ApiResponse<auth::dtos::RoleAssignmentDto>,
            ApiResponse<Vec<auth::dtos::AdminUserDto>>,
            // Documents
            documents_models::Document,
            documents_models::DocumentVerification,
            documents_models::VerificationStatus,
            documents_dtos::CreateDocumentDto,
            documents_dtos::UpdateDocumentDto,
            documents_dtos::UploadDocumentDto,
            documents_dtos::VerifyChecksumDto,
            documents_dtos::VerifyChecksumResponseDto,
            documents_dtos::DownloadUrlDto,
            ApiResponse<documents_models::Document>,
            ApiResponse<Vec<documents_models::Document>>,
            ApiResponse<Vec<documents_models::DocumentVerification>>,
            ApiResponse<documents_dtos::VerifyChecksumResponseDto>,
            ApiResponse<documents_dtos::DownloadUrlDto>,
            // Shares
            shares_models::PermissionLevel,
            shares_models::DocumentShare,
            shares_models::ShareToken,
            shares_models::SharedDocument,
            shares_models::DocumentSummary,
            shares_models::ShareWithDocument,
            shares_dtos::ShareDocumentDto,
            shares_dtos::UnshareDocumentDto,
            shares_dtos::CreateSecureShareDto,
            shares_dtos::SecureShareCreatedDto,
            shares_dtos::UpdateSecureShareDto,
            shares_dtos::ShareAccessDto,
            shares_dtos::UserSummaryDto,
            shares_dtos::UserSearchResultDto,
            shares_dtos::DocumentRecipientDto,
            shares_dtos::SharePermissionDto,
            shares_dtos::VerifyShareAccessDto,
            shares_dtos::CleanupResultDto,
            shares_dtos::IssueShareTokenDto,
            shares_dtos::TokenRedemptionDto,
            ApiResponse<shares_models::DocumentShare>,
            ApiResponse<shares_models::ShareToken>,
            ApiResponse<Vec<shares_models::ShareWithDocument>>,
            ApiResponse<shares_dtos::SecureShareCreatedDto>,
            ApiResponse<shares_dtos::ShareAccessDto>,
            ApiResponse<shares_dtos::UserSearchResultDto>,
            ApiResponse<Vec<shares_dtos::DocumentRecipientDto>>,
            ApiResponse<shares_dtos::SharePermissionDto>,
            ApiResponse<shares_dtos::CleanupResultDto>,
            ApiResponse<shares_dtos::TokenRedemptionDto>,
        )
    ),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration, login and session management"),
        (name = "documents", description = "Document upload, metadata and integrity checks"),
        (name = "shares", description = "Sharing documents between users"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Docvault API",
        version = "0.1.0",
        description = "API documentation for Docvault",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
