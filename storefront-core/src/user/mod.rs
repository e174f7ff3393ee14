//! 用户服务：注册、认证、邮箱验证、权限与登录审计

mod activity;
mod auth;
pub mod crypto;
mod manager;
mod models;
mod password;
mod permissions;

pub use manager::UserManager;
pub use models::{
    AuthResponse, ChangePasswordRequest, ClientContext, CreateUserRequest, EmailRequest,
    LoginActivity, LoginRequest, RegisterRequest, ResetPasswordRequest, UpdatePermissionsRequest,
    UpdateUserRequest, User, UserResponse,
};
pub use permissions::{Permissions, Role};
