use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    change_password, create_product, create_user, delete_product, delete_user, forgot_password,
    get_me, get_product, get_product_by_sku, get_user, handler_404, health, list_products,
    list_users, login, login_activity, make_admin, register, resend_verification, reset_password,
    update_permissions, update_product, update_stock, update_user, verify_email,
};
use super::middleware::identity_middleware;
use super::state::AppState;

/// 根据配置的来源列表构建 CorsLayer
fn build_cors_layer(cors_origins: Vec<String>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-user-id"),
        ]);

    if cors_origins.is_empty() {
        // 未配置时允许所有来源
        tracing::warn!("SF_CORS_ORIGINS not configured, allowing all origins");
        base.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .into_iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        base.allow_origin(origins)
    }
}

/// Build the router with routes and middleware wired.
pub fn app_router(state: AppState, cors_origins: Vec<String>) -> Router {
    // 公开端点（不需要 X-User-Id）
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/verify-email", get(verify_email))
        .route("/api/auth/resend-verification", post(resend_verification));

    // 需要身份的认证端点
    let account_routes = Router::new()
        .route("/api/auth/me", get(get_me))
        .route("/api/auth/change-password/:user_id", post(change_password))
        .route("/api/auth/login-activity/:user_id", get(login_activity))
        .route("/api/auth/update-permissions", post(update_permissions))
        .route("/api/auth/make-admin/:user_id", post(make_admin));

    // 用户管理端点（权限由 handler 检查）
    let user_routes = Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        );

    let product_routes = Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/sku/:sku", get(get_product_by_sku))
        .route(
            "/api/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/api/products/:id/stock", patch(update_stock));

    Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(user_routes)
        .merge(product_routes)
        .fallback(handler_404)
        .layer(from_fn_with_state(state.clone(), identity_middleware))
        .layer(build_cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
