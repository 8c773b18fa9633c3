use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::features::shares::handlers;
use crate::features::shares::services::ShareService;

/// Sharing routes (all require authentication)
pub fn routes(service: Arc<ShareService>) -> Router {
    Router::new()
        .route("/share/documents", post(handlers::share_document))
        .route("/share/documents/unshare", post(handlers::unshare_document))
        .route("/share/shared-with-me", get(handlers::shared_with_me))
        .route("/share/my-shares", get(handlers::my_shares))
        .route(
            "/share/secure/access/{token}",
            get(handlers::access_secure_share),
        )
        .route(
            "/share/secure/{id}",
            post(handlers::create_secure_share)
                .patch(handlers::update_secure_share)
                .delete(handlers::revoke_secure_share),
        )
        .route("/share/search-users", get(handlers::search_users))
        .route("/share/document-users/{id}", get(handlers::document_users))
        .route(
            "/share/check-permission/{id}",
            get(handlers::check_permission),
        )
        .route("/share/verify-access", post(handlers::verify_access))
        .route("/share/cleanup-expired", post(handlers::cleanup_expired))
        .route("/share/tokens", post(handlers::issue_share_token))
        .route(
            "/share/tokens/{token}/redeem",
            post(handlers::redeem_share_token),
        )
        .route("/share/tokens/{token}", delete(handlers::revoke_share_token))
        .with_state(service)
}
