use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::core::config::CookieConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::dtos::{
    AdminUserDto, AssignRoleRequestDto, AuthResponseDto, AuthUserDto, LoginRequestDto,
    RegisterRequestDto, RoleAssignmentDto, SessionDto,
};
use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::features::auth::roles::RoleService;
use crate::modules::supabase::{Auth, BaasUser, Query, Session, SupabaseClient};
use crate::shared::constants::TABLE_PROFILES;

/// Service for authentication operations backed by the BaaS auth API
pub struct AuthService {
    client: Arc<SupabaseClient>,
    roles: Arc<RoleService>,
    frontend_url: String,
    cookies: CookieConfig,
}

impl AuthService {
    pub fn new(
        client: Arc<SupabaseClient>,
        roles: Arc<RoleService>,
        frontend_url: String,
        cookies: CookieConfig,
    ) -> Self {
        Self {
            client,
            roles,
            frontend_url,
            cookies,
        }
    }

    pub fn cookie_config(&self) -> &CookieConfig {
        &self.cookies
    }

    /// Login with email and password
    ///
    /// Returns the response DTO plus the raw session so the handler can set cookies.
    pub async fn login(&self, dto: LoginRequestDto) -> Result<(AuthResponseDto, Session)> {
        let session = self
            .client
            .sign_in_with_password(&dto.email, &dto.password)
            .await
            .map_err(map_login_error)?;

        let role = self
            .roles
            .find_role(&session.access_token, &session.user.id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Role lookup failed for {}: {}", session.user.id, e);
                None
            })
            .unwrap_or_default();

        self.ensure_profile(&session.access_token, &session.user)
            .await;

        tracing::info!("User {} logged in", session.user.id);

        Ok((
            AuthResponseDto {
                user: AuthUserDto::from_baas(&session.user, role),
                session: Some(SessionDto::from(&session)),
            },
            session,
        ))
    }

    /// Register a new account, then create its profile and default role best-effort
    pub async fn register(
        &self,
        dto: RegisterRequestDto,
    ) -> Result<(AuthResponseDto, Option<Session>)> {
        let outcome = self
            .client
            .sign_up(
                &dto.email,
                &dto.password,
                json!({
                    "username": dto.username,
                    "name": dto.name,
                    "full_name": dto.name,
                }),
            )
            .await
            .map_err(map_register_error)?;

        let user = outcome.user().clone();
        let session = outcome.session().cloned();

        // Without a session (email confirmation pending) these run as anon and may be refused by RLS
        let auth_token = session.as_ref().map(|s| s.access_token.clone());
        self.create_profile(auth_token.as_deref(), &user.id, &dto.name)
            .await;
        match auth_token.as_deref() {
            Some(token) => self.roles.assign_default(token, &user.id).await,
            None => tracing::info!(
                "Default role for {} deferred until first authenticated request",
                user.id
            ),
        }

        tracing::info!("User registered: {}", user.id);

        let mut user_dto = AuthUserDto::from_baas(&user, Role::Owner);
        user_dto.username = Some(dto.username);
        user_dto.name = Some(dto.name);
        user_dto.email_confirmed = false;

        Ok((
            AuthResponseDto {
                user: user_dto,
                session: session.as_ref().map(SessionDto::from),
            },
            session,
        ))
    }

    /// Exchange a refresh token for a new session
    pub async fn refresh(&self, refresh_token: &str) -> Result<(AuthResponseDto, Session)> {
        let session = self
            .client
            .refresh_session(refresh_token)
            .await
            .map_err(|e| {
                tracing::debug!("Refresh failed: {}", e);
                AppError::Unauthorized("Session could not be renewed".to_string())
            })?;

        let role = self
            .roles
            .find_role(&session.access_token, &session.user.id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Role lookup failed for {}: {}", session.user.id, e);
                None
            })
            .unwrap_or_default();

        Ok((
            AuthResponseDto {
                user: AuthUserDto::from_baas(&session.user, role),
                session: Some(SessionDto::from(&session)),
            },
            session,
        ))
    }

    /// Revoke the session upstream; failures only get logged
    pub async fn logout(&self, user: &AuthenticatedUser) {
        if let Err(e) = self.client.sign_out(&user.access_token).await {
            tracing::warn!("Sign out failed for {}: {}", user.id, e);
        }
        tracing::info!("User {} logged out", user.id);
    }

    /// Send a password reset email without revealing whether the account exists
    pub async fn forgot_password(&self, email: &str) {
        let redirect_to = format!("{}/reset-password", self.frontend_url);
        if let Err(e) = self
            .client
            .reset_password_for_email(email, &redirect_to)
            .await
        {
            tracing::warn!("Password reset request failed: {}", e);
        }
    }

    pub async fn assign_role(
        &self,
        admin: &AuthenticatedUser,
        dto: AssignRoleRequestDto,
    ) -> Result<RoleAssignmentDto> {
        let role: Role = dto.role.parse()?;
        let row = self
            .roles
            .assign(&admin.access_token, &dto.user_id, role)
            .await?;

        Ok(RoleAssignmentDto {
            user_id: row.user_id,
            role: row.role,
        })
    }

    pub async fn list_users(&self, admin: &AuthenticatedUser) -> Result<Vec<AdminUserDto>> {
        let rows = self.roles.list(&admin.access_token).await?;
        Ok(rows
            .into_iter()
            .map(|row| AdminUserDto::from_row(row, &admin.id))
            .collect())
    }

    /// Create the profile row for a user if missing
    async fn ensure_profile(&self, access_token: &str, user: &BaasUser) {
        let existing: Result<Option<Value>> = self
            .client
            .select_optional(
                Auth::User(access_token),
                TABLE_PROFILES,
                &Query::new().select("user_id").eq("user_id", &user.id),
            )
            .await;

        match existing {
            Ok(Some(_)) => {}
            Ok(None) => {
                let full_name = ["name", "full_name"]
                    .iter()
                    .find_map(|k| user.user_metadata.get(*k).and_then(|v| v.as_str()))
                    .unwrap_or("");
                self.create_profile(Some(access_token), &user.id, full_name)
                    .await;
            }
            Err(e) => tracing::warn!("Profile lookup failed for {}: {}", user.id, e),
        }
    }

    async fn create_profile(&self, access_token: Option<&str>, user_id: &str, full_name: &str) {
        let auth = access_token.map(Auth::User).unwrap_or(Auth::Anon);
        let now = Utc::now();
        let result: Result<Value> = self
            .client
            .insert(
                auth,
                TABLE_PROFILES,
                &json!({
                    "user_id": user_id,
                    "full_name": full_name,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await;

        if let Err(e) = result {
            tracing::warn!("Failed to create profile for {}: {}", user_id, e);
        }
    }
}

fn map_login_error(err: AppError) -> AppError {
    match &err {
        AppError::BadRequest(msg) | AppError::Unauthorized(msg) => {
            if msg.contains("Email not confirmed") {
                AppError::Unauthorized("Please confirm your email before signing in".to_string())
            } else if msg.contains("Invalid login credentials") {
                AppError::Unauthorized("Incorrect email or login details".to_string())
            } else {
                AppError::Unauthorized("Sign in failed".to_string())
            }
        }
        _ => err,
    }
}

fn map_register_error(err: AppError) -> AppError {
    match &err {
        AppError::BadRequest(msg) | AppError::Conflict(msg) => {
            if msg.contains("already registered") {
                AppError::Conflict("This email is already registered".to_string())
            } else if msg.contains("Password should be at least") {
                AppError::BadRequest("The chosen passphrase is too weak".to_string())
            } else {
                AppError::BadRequest("Registration failed".to_string())
            }
        }
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_error_mapping() {
        match map_login_error(AppError::BadRequest("Email not confirmed".into())) {
            AppError::Unauthorized(msg) => assert!(msg.contains("confirm your email")),
            other => panic!("unexpected: {:?}", other),
        }
        match map_login_error(AppError::BadRequest("Invalid login credentials".into())) {
            AppError::Unauthorized(msg) => assert_eq!(msg, "Incorrect email or login details"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            map_login_error(AppError::Upstream {
                status: 500,
                message: "down".into()
            }),
            AppError::Upstream { .. }
        ));
    }

    #[test]
    fn test_register_error_mapping() {
        assert!(matches!(
            map_register_error(AppError::BadRequest("User already registered".into())),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            map_register_error(AppError::BadRequest(
                "Password should be at least 6 characters".into()
            )),
            AppError::BadRequest(_)
        ));
    }
}
