use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::cookies::{
    refresh_token_from, with_session_cookies, without_session_cookies,
};
use crate::features::auth::dtos::{
    AdminUserDto, AssignRoleRequestDto, AuthResponseDto, ForgotPasswordRequestDto,
    LoginRequestDto, MeResponseDto, RefreshTokenRequestDto, RegisterRequestDto,
    RoleAssignmentDto,
};
use crate::features::auth::guards::RequireAdmin;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::auth::services::AuthService;
use crate::shared::types::{ApiResponse, Meta};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use validator::Validate;

/// Register a new user
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequestDto,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<AuthResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    State(service): State<Arc<AuthService>>,
    jar: CookieJar,
    AppJson(dto): AppJson<RegisterRequestDto>,
) -> Result<(StatusCode, CookieJar, Json<ApiResponse<AuthResponseDto>>)> {
    let dto = dto.normalized();
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (response, session) = service.register(dto).await?;
    let jar = match &session {
        Some(session) => with_session_cookies(jar, service.cookie_config(), session),
        None => jar,
    };

    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::success(
            Some(response),
            Some("Registration successful. Please verify your email.".to_string()),
            None,
        )),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequestDto,
    responses(
        (status = 200, description = "Login successful, session cookies set", body = ApiResponse<AuthResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials or unconfirmed email")
    ),
    tag = "auth"
)]
pub async fn login(
    State(service): State<Arc<AuthService>>,
    jar: CookieJar,
    AppJson(dto): AppJson<LoginRequestDto>,
) -> Result<(CookieJar, Json<ApiResponse<AuthResponseDto>>)> {
    let dto = dto.normalized();
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (response, session) = service.login(dto).await?;
    let jar = with_session_cookies(jar, service.cookie_config(), &session);

    Ok((jar, Json(ApiResponse::success(Some(response), None, None))))
}

/// Refresh the session using the body token or the refresh cookie
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body(content = RefreshTokenRequestDto, description = "Optional when the refresh cookie is present"),
    responses(
        (status = 200, description = "Session refreshed, cookies rewritten", body = ApiResponse<AuthResponseDto>),
        (status = 401, description = "Invalid or expired refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    State(service): State<Arc<AuthService>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<Response> {
    let dto: RefreshTokenRequestDto = if body.is_empty() {
        RefreshTokenRequestDto::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON data: {}", e)))?
    };
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let refresh_token = dto
        .refresh_token
        .or_else(|| refresh_token_from(&jar))
        .ok_or_else(|| AppError::Unauthorized("Refresh is required to renew the session".to_string()))?;

    match service.refresh(&refresh_token).await {
        Ok((response, session)) => {
            let jar = with_session_cookies(jar, service.cookie_config(), &session);
            Ok((jar, Json(ApiResponse::success(Some(response), None, None))).into_response())
        }
        // Drop stale session cookies
        Err(e) => Ok((without_session_cookies(jar, service.cookie_config()), e).into_response()),
    }
}

/// Logout and clear session cookies
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    user: AuthenticatedUser,
    State(service): State<Arc<AuthService>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<()>>)> {
    service.logout(&user).await;
    let jar = without_session_cookies(jar, service.cookie_config());

    Ok((
        jar,
        Json(ApiResponse::success(
            None,
            Some("Logged out successfully".to_string()),
            None,
        )),
    ))
}

/// Request a password reset email
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequestDto,
    responses(
        (status = 200, description = "Neutral confirmation, never reveals whether the account exists"),
        (status = 400, description = "Validation error")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    State(service): State<Arc<AuthService>>,
    AppJson(dto): AppJson<ForgotPasswordRequestDto>,
) -> Result<Json<ApiResponse<()>>> {
    let dto = dto.normalized();
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    service.forgot_password(&dto.email).await;

    Ok(Json(ApiResponse::success(
        None,
        Some("If the email exists, you will receive reset instructions".to_string()),
        None,
    )))
}

/// Get current authenticated user info
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user retrieved successfully", body = ApiResponse<MeResponseDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(user: AuthenticatedUser) -> Result<Json<ApiResponse<MeResponseDto>>> {
    Ok(Json(ApiResponse::success(
        Some(MeResponseDto::from(user)),
        None,
        None,
    )))
}

/// Assign a role to a user (admin only)
#[utoipa::path(
    post,
    path = "/auth/admin/assign-role",
    request_body = AssignRoleRequestDto,
    responses(
        (status = 200, description = "Role assigned", body = ApiResponse<RoleAssignmentDto>),
        (status = 400, description = "Invalid role"),
        (status = 403, description = "Admin access required")
    ),
    tag = "auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn assign_role(
    RequireAdmin(admin): RequireAdmin,
    State(service): State<Arc<AuthService>>,
    AppJson(dto): AppJson<AssignRoleRequestDto>,
) -> Result<Json<ApiResponse<RoleAssignmentDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let assignment = service.assign_role(&admin, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(assignment),
        Some("Role assigned successfully".to_string()),
        None,
    )))
}

/// List users with assigned roles (admin only)
#[utoipa::path(
    get,
    path = "/auth/admin/users",
    responses(
        (status = 200, description = "Users with roles", body = ApiResponse<Vec<AdminUserDto>>),
        (status = 403, description = "Admin access required")
    ),
    tag = "auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    RequireAdmin(admin): RequireAdmin,
    State(service): State<Arc<AuthService>>,
) -> Result<Json<ApiResponse<Vec<AdminUserDto>>>> {
    let users = service.list_users(&admin).await?;
    let total = users.len();
    Ok(Json(ApiResponse::success(
        Some(users),
        None,
        Some(Meta::total(total)),
    )))
}
