use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use storefront_core::{ClientContext, Permissions, User};

use super::error::ApiError;
use super::state::AppState;

/// 调用方身份头
pub const USER_ID_HEADER: &str = "X-User-Id";

/// 认证信息扩展
#[derive(Debug, Clone)]
pub struct AuthInfo {
	pub user: User,
}

impl AuthInfo {
	pub fn user_id(&self) -> i64 {
		self.user.id
	}

	pub fn is_admin(&self) -> bool {
		self.user.is_admin()
	}

	pub fn has(&self, permission: Permissions) -> bool {
		self.user.has_permission(permission)
	}

	/// 缺少权限时返回 Permission denied
	pub fn require(&self, permission: Permissions) -> Result<(), ApiError> {
		if self.has(permission) {
			Ok(())
		} else {
			tracing::warn!(user_id = self.user.id, required = %permission, "permission denied");
			Err(ApiError::permission_denied())
		}
	}

	/// 本人或持有指定权限
	pub fn require_self_or(&self, user_id: i64, permission: Permissions) -> Result<(), ApiError> {
		if self.user.id == user_id {
			return Ok(());
		}
		self.require(permission)
	}
}

fn auth_from_parts(parts: &Parts) -> Result<AuthInfo, ApiError> {
	parts
		.extensions
		.get::<AuthInfo>()
		.cloned()
		.ok_or_else(ApiError::unauthenticated)
}

/// 要求已识别调用方的 Extractor
#[derive(Debug, Clone)]
pub struct RequireUser(pub AuthInfo);

impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		_state: &'b S,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move { auth_from_parts(parts).map(RequireUser) })
	}
}

/// 要求管理员角色的 Extractor
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthInfo);

impl<S: Send + Sync> FromRequestParts<S> for RequireAdmin {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		_state: &'b S,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let auth = auth_from_parts(parts)?;
			if !auth.is_admin() {
				tracing::warn!(user_id = auth.user_id(), "admin access denied");
				return Err(ApiError::admin_required());
			}
			Ok(RequireAdmin(auth))
		})
	}
}

/// 请求来源（IP 与 User-Agent），用于登录审计与限流
#[derive(Debug, Clone)]
pub struct ClientInfo(pub ClientContext);

impl ClientInfo {
	/// 限流 key
	pub fn ip(&self) -> &str {
		self.0.ip_address.as_deref().unwrap_or("unknown")
	}
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		_state: &'b S,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let socket = parts
				.extensions
				.get::<ConnectInfo<SocketAddr>>()
				.map(|ci| ci.0);
			let user_agent = parts
				.headers
				.get(header::USER_AGENT)
				.and_then(|v| v.to_str().ok())
				.map(str::to_string);
			Ok(ClientInfo(ClientContext {
				ip_address: extract_client_ip(&parts.headers, socket),
				user_agent,
			}))
		})
	}
}

/// 不需要身份的路径
const PUBLIC_PATHS: &[&str] = &[
	"/health",
	"/api/auth/register",
	"/api/auth/login",
	"/api/auth/forgot-password",
	"/api/auth/reset-password",
	"/api/auth/verify-email",
	"/api/auth/resend-verification",
];

/// 匿名可读的商品目录前缀（仅 GET）
const PUBLIC_READ_PREFIX: &str = "/api/products";

fn is_public(method: &Method, path: &str) -> bool {
	if PUBLIC_PATHS.iter().any(|p| path == *p) {
		return true;
	}
	*method == Method::GET
		&& (path == PUBLIC_READ_PREFIX
			|| path
				.strip_prefix(PUBLIC_READ_PREFIX)
				.is_some_and(|rest| rest.starts_with('/')))
}

/// 从请求头中解析调用方 ID
fn extract_user_id(headers: &HeaderMap) -> Option<i64> {
	headers
		.get(USER_ID_HEADER)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.trim().parse().ok())
}

/// 从请求中提取客户端 IP
/// 优先级：X-Real-IP > X-Forwarded-For（第一个） > Socket Address
fn extract_client_ip(headers: &HeaderMap, socket: Option<SocketAddr>) -> Option<String> {
	// 1. 优先从 X-Real-IP header 获取（Nginx 常用）
	if let Some(real_ip) = headers
		.get("X-Real-IP")
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty())
	{
		return Some(real_ip.to_string());
	}

	// 2. 从 X-Forwarded-For 获取第一个 IP（最左边是真实客户端）
	if let Some(forwarded) = headers
		.get("X-Forwarded-For")
		.and_then(|v| v.to_str().ok())
	{
		if let Some(first_ip) = forwarded.split(',').next().map(|s| s.trim()) {
			if !first_ip.is_empty() {
				return Some(first_ip.to_string());
			}
		}
	}

	// 3. fallback 到直连 socket 地址
	socket.map(|addr| addr.ip().to_string())
}

pub async fn identity_middleware(
	State(state): State<AppState>,
	mut request: Request<Body>,
	next: Next,
) -> Result<Response, ApiError> {
	let path = request.uri().path().to_string();

	// 公开端点不需要身份
	if is_public(request.method(), &path) {
		return Ok(next.run(request).await);
	}

	let Some(user_id) = extract_user_id(request.headers()) else {
		tracing::debug!(path = %path, "request without caller id");
		return Err(ApiError::unauthenticated());
	};

	let user = match state.user_manager.get_user(user_id).await {
		Ok(user) => user,
		Err(storefront_core::ServiceError::NotFound(_)) => {
			tracing::warn!(user_id, path = %path, "unknown caller id");
			return Err(ApiError::unauthenticated());
		}
		Err(e) => return Err(e.into()),
	};

	if !user.is_active {
		return Err(ApiError::unauthorized_with_message("Account is deactivated"));
	}

	request.extensions_mut().insert(AuthInfo { user });
	Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	#[test]
	fn client_ip_prefers_proxy_headers() {
		let socket: SocketAddr = "192.168.1.9:5000".parse().unwrap();
		let mut headers = HeaderMap::new();
		assert_eq!(
			extract_client_ip(&headers, Some(socket)).as_deref(),
			Some("192.168.1.9")
		);

		headers.insert("X-Forwarded-For", HeaderValue::from_static("10.1.1.1, 10.2.2.2"));
		assert_eq!(
			extract_client_ip(&headers, Some(socket)).as_deref(),
			Some("10.1.1.1")
		);

		headers.insert("X-Real-IP", HeaderValue::from_static("172.16.0.3"));
		assert_eq!(
			extract_client_ip(&headers, Some(socket)).as_deref(),
			Some("172.16.0.3")
		);
		assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
	}

	#[test]
	fn user_id_header_must_be_numeric() {
		let mut headers = HeaderMap::new();
		assert_eq!(extract_user_id(&headers), None);
		headers.insert(USER_ID_HEADER, HeaderValue::from_static("abc"));
		assert_eq!(extract_user_id(&headers), None);
		headers.insert(USER_ID_HEADER, HeaderValue::from_static(" 42 "));
		assert_eq!(extract_user_id(&headers), Some(42));
	}

	#[test]
	fn product_catalog_is_readable_anonymously() {
		assert!(is_public(&Method::GET, "/api/products"));
		assert!(is_public(&Method::GET, "/api/products/3"));
		assert!(is_public(&Method::GET, "/api/products/sku/KB-1"));
		assert!(!is_public(&Method::POST, "/api/products"));
		assert!(!is_public(&Method::DELETE, "/api/products/3"));
		assert!(!is_public(&Method::GET, "/api/productsx"));
		assert!(!is_public(&Method::GET, "/api/users"));
		assert!(is_public(&Method::POST, "/api/auth/login"));
	}
}
