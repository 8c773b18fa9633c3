use std::sync::Arc;

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;

use crate::core::config::CookieConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::cookies::{access_token_from, refresh_token_from};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::auth::roles::RoleService;
use crate::features::auth::validator::TokenValidator;
use crate::modules::supabase::{BaasUser, Session, SupabaseClient};

/// Result of authenticating a request
pub struct Authenticated {
    pub user: AuthenticatedUser,
    /// New session when the access token had to be refreshed
    pub refreshed: Option<Session>,
}

/// Resolves the caller of a request from cookies or bearer header
pub struct Authenticator {
    validator: Arc<TokenValidator>,
    roles: Arc<RoleService>,
    client: Arc<SupabaseClient>,
    cookies: CookieConfig,
}

impl Authenticator {
    pub fn new(
        validator: Arc<TokenValidator>,
        roles: Arc<RoleService>,
        client: Arc<SupabaseClient>,
        cookies: CookieConfig,
    ) -> Self {
        Self {
            validator,
            roles,
            client,
            cookies,
        }
    }

    pub fn cookie_config(&self) -> &CookieConfig {
        &self.cookies
    }

    /// Authenticate using the `access_token` cookie, then the bearer header
    ///
    /// When the token is missing or rejected and a `refresh_token` cookie is
    /// present, one refresh exchange is attempted.
    pub async fn authenticate(&self, jar: &CookieJar, headers: &HeaderMap) -> Result<Authenticated> {
        let token = access_token_from(jar).or_else(|| bearer_token(headers));

        if let Some(token) = &token {
            match self.validator.validate_token(token).await {
                Ok(user) => return self.with_role(user, token.clone(), None).await,
                Err(e) => tracing::debug!("Access token rejected: {}", e),
            }
        }

        if let Some(refresh_token) = refresh_token_from(jar) {
            match self.client.refresh_session(&refresh_token).await {
                Ok(session) => {
                    tracing::info!("Session refreshed automatically for user {}", session.user.id);
                    let user = session.user.clone();
                    let access_token = session.access_token.clone();
                    return self.with_role(user, access_token, Some(session)).await;
                }
                Err(e) => tracing::warn!("Automatic session refresh failed: {}", e),
            }
        }

        Err(AppError::Unauthorized(match token {
            Some(_) => "Session is invalid or expired".to_string(),
            None => "Authentication required".to_string(),
        }))
    }

    async fn with_role(
        &self,
        user: BaasUser,
        access_token: String,
        refreshed: Option<Session>,
    ) -> Result<Authenticated> {
        let (role, role_assigned) = self.roles.resolve(&access_token, &user.id).await?;

        Ok(Authenticated {
            user: AuthenticatedUser {
                id: user.id,
                email: user.email,
                user_metadata: user.user_metadata,
                created_at: user.created_at,
                updated_at: user.updated_at,
                role,
                role_assigned,
                access_token,
            },
            refreshed,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_none());
    }
}
