//! 用户管理 API handlers（按权限位授权）

use axum::extract::State;
use axum::http::StatusCode;
use storefront_core::{CreateUserRequest, Permissions, UpdateUserRequest, UserResponse};

use super::super::error::ApiError;
use super::super::extract::{ApiJson, ApiPath};
use super::super::middleware::RequireUser;
use super::super::response::ApiResponse;
use super::super::state::AppState;

/// GET /api/users - 列出所有用户
pub async fn list_users(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
) -> Result<ApiResponse<Vec<UserResponse>>, ApiError> {
    auth.require(Permissions::VIEW_USERS)?;
    let users = state.user_manager.list_users().await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

/// POST /api/users - 创建用户（已验证邮箱）；指定初始权限需要管理员身份
pub async fn create_user(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, ApiResponse<UserResponse>), ApiError> {
    auth.require(Permissions::EDIT_USERS)?;
    if req.permissions.is_some_and(|bits| bits != 0) && !auth.is_admin() {
        tracing::warn!(user_id = auth.user_id(), "non-admin tried to grant permissions on create");
        return Err(ApiError::admin_required());
    }
    let user = state.user_manager.create_user(req).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(user.into(), "User created successfully"),
    ))
}

/// GET /api/users/:id - 本人或 VIEW_USERS
pub async fn get_user(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    auth.require_self_or(id, Permissions::VIEW_USERS)?;
    let user = state.user_manager.get_user(id).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// PUT /api/users/:id - 本人或 EDIT_USERS；启用状态只能由他人修改，修改管理员需要管理员身份
pub async fn update_user(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    auth.require_self_or(id, Permissions::EDIT_USERS)?;
    if auth.user_id() == id {
        if req.is_active.is_some() {
            return Err(ApiError::bad_request(
                "You cannot change your own active status",
            ));
        }
    } else {
        let target = state.user_manager.get_user(id).await?;
        if target.is_admin() && !auth.is_admin() {
            tracing::warn!(user_id = auth.user_id(), target_id = id, "non-admin tried to edit an admin");
            return Err(ApiError::admin_required());
        }
    }

    let user = state.user_manager.update_user(id, req).await?;
    Ok(ApiResponse::with_message(
        user.into(),
        "User updated successfully",
    ))
}

/// DELETE /api/users/:id - DELETE_USERS；不能删除自己，删除管理员需要管理员身份
pub async fn delete_user(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<bool>, ApiError> {
    auth.require(Permissions::DELETE_USERS)?;
    if auth.user_id() == id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let target = state.user_manager.get_user(id).await?;
    if target.is_admin() && !auth.is_admin() {
        return Err(ApiError::admin_required());
    }

    state.user_manager.delete_user(id).await?;
    Ok(ApiResponse::with_message(true, "User deleted successfully"))
}
