use std::sync::Arc;
use storefront_core::{ProductManager, UserManager};

use super::RateLimiter;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub user_manager: Arc<UserManager>,
    pub product_manager: Arc<ProductManager>,
    /// 登录接口限流（按 IP）
    pub login_limiter: Arc<RateLimiter>,
    /// 找回密码限流（按 IP）
    pub reset_limiter: Arc<RateLimiter>,
}
