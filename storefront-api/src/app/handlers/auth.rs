//! 认证相关 API handlers

use axum::extract::State;
use serde::Deserialize;
use storefront_core::{
    AuthResponse, ChangePasswordRequest, EmailRequest, LoginActivity, LoginRequest, Permissions,
    RegisterRequest, ResetPasswordRequest, UpdatePermissionsRequest, UserResponse,
};
use validator::Validate;

use super::super::error::ApiError;
use super::super::extract::{ApiJson, ApiPath, ApiQuery};
use super::super::middleware::{ClientInfo, RequireAdmin, RequireUser};
use super::super::response::ApiResponse;
use super::super::state::AppState;

/// POST /api/auth/register - 注册
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let resp = state.user_manager.register(req).await?;
    let message = if resp.token.is_empty() {
        "Registration successful. Please check your email to verify your account.".to_string()
    } else {
        format!("Registration successful. Verification token: {}", resp.token)
    };
    Ok(ApiResponse::with_message(resp, message))
}

/// POST /api/auth/login - 登录（按 IP 限流）
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    if !state.login_limiter.allow(client.ip()).await {
        return Err(ApiError::too_many_requests(
            "Too many login attempts, try again later",
        ));
    }

    let resp = state
        .user_manager
        .login(&req.email, &req.password, &client.0)
        .await?;
    Ok(ApiResponse::with_message(resp, "Login successful"))
}

/// POST /api/auth/forgot-password - 申请重置密码
pub async fn forgot_password(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<EmailRequest>,
) -> Result<ApiResponse<Option<String>>, ApiError> {
    if !state.reset_limiter.allow(client.ip()).await {
        return Err(ApiError::too_many_requests(
            "Too many password reset requests, try again later",
        ));
    }
    req.validate().map_err(storefront_core::ServiceError::from)?;

    // 消息与账户是否存在无关；演示模式下 token 只放在 data 中
    let token = state.user_manager.forgot_password(&req.email).await?;
    Ok(ApiResponse::with_message(
        token,
        "If the email exists, a password reset link has been sent",
    ))
}

/// POST /api/auth/reset-password - 使用重置 token 设置新密码
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<ApiResponse<bool>, ApiError> {
    state.user_manager.reset_password(req).await?;
    Ok(ApiResponse::with_message(
        true,
        "Password has been reset successfully",
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    #[serde(default)]
    pub token: String,
}

/// GET /api/auth/verify-email?token= - 验证邮箱
pub async fn verify_email(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<VerifyEmailQuery>,
) -> Result<ApiResponse<bool>, ApiError> {
    state.user_manager.verify_email(&query.token).await?;
    Ok(ApiResponse::with_message(true, "Email verified successfully"))
}

/// POST /api/auth/resend-verification - 重新发送验证邮件
pub async fn resend_verification(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailRequest>,
) -> Result<ApiResponse<Option<String>>, ApiError> {
    req.validate().map_err(storefront_core::ServiceError::from)?;
    let token = state.user_manager.resend_verification(&req.email).await?;
    Ok(ApiResponse::with_message(
        token,
        "If the email exists, a verification link has been sent",
    ))
}

/// POST /api/auth/change-password/:user_id - 本人修改密码
pub async fn change_password(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<ApiResponse<bool>, ApiError> {
    if auth.user_id() != user_id {
        return Err(ApiError::permission_denied());
    }
    state.user_manager.change_password(user_id, req).await?;
    Ok(ApiResponse::with_message(true, "Password changed successfully"))
}

/// GET /api/auth/login-activity/:user_id - 最近登录记录
pub async fn login_activity(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<ApiResponse<Vec<LoginActivity>>, ApiError> {
    auth.require_self_or(user_id, Permissions::VIEW_USERS)?;
    let rows = state.user_manager.login_activity(user_id).await?;
    Ok(ApiResponse::ok(rows))
}

/// POST /api/auth/update-permissions - 覆盖用户权限（管理员）
pub async fn update_permissions(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(req): ApiJson<UpdatePermissionsRequest>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    tracing::info!(admin_id = admin.user_id(), user_id = req.user_id, "updating permissions");
    let user = state
        .user_manager
        .update_permissions(req.user_id, req.permissions)
        .await?;
    Ok(ApiResponse::with_message(
        user.into(),
        "Permissions updated successfully",
    ))
}

/// POST /api/auth/make-admin/:user_id - 提升为管理员
pub async fn make_admin(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    tracing::info!(admin_id = admin.user_id(), user_id, "promoting user to admin");
    let user = state.user_manager.make_admin(user_id).await?;
    Ok(ApiResponse::with_message(
        user.into(),
        "User promoted to admin successfully",
    ))
}

/// GET /api/auth/me - 当前调用方资料
pub async fn get_me(RequireUser(auth): RequireUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(auth.user.into())
}
