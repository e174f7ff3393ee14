mod app;

use app::{app_router, AppState, RateLimiter};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use storefront_core::user::crypto::DEFAULT_PASSWORD_SALT;
use storefront_core::{db, Notifier, ProductManager, UserManager};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
struct ApiConfig {
    bind: SocketAddr,
    /// 用户服务数据库
    users_database_url: String,
    /// 商品服务数据库
    products_database_url: String,
    password_salt: String,
    /// 邮件链接的站点地址
    public_url: String,
    /// 演示模式：响应中返回验证 / 重置 token
    expose_tokens: bool,
    /// CORS 允许的来源列表（空则允许所有）
    cors_origins: Vec<String>,
    /// 每个 IP 每分钟允许的登录次数
    login_rate_limit: usize,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl ApiConfig {
    fn from_env() -> Self {
        let bind = env::var("SF_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let expose_tokens = env::var("SF_EXPOSE_TOKENS")
            .map(|s| !matches!(s.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let login_rate_limit = env::var("SF_LOGIN_RATE_LIMIT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(10);

        // CORS 允许的来源，逗号分隔；空或 "*" 表示允许所有
        let cors_origins = env::var("SF_CORS_ORIGINS")
            .ok()
            .map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "*" {
                    vec![]
                } else {
                    trimmed
                        .split(',')
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| t.trim().to_string())
                        .collect()
                }
            })
            .unwrap_or_default();

        Self {
            bind,
            users_database_url: env_or("SF_USERS_DATABASE_URL", "sqlite://data/users.db"),
            products_database_url: env_or("SF_PRODUCTS_DATABASE_URL", "sqlite://data/products.db"),
            password_salt: env_or("SF_PASSWORD_SALT", DEFAULT_PASSWORD_SALT),
            public_url: env_or("SF_PUBLIC_URL", "http://localhost:8080"),
            expose_tokens,
            cors_origins,
            login_rate_limit,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 优先读取 .env（若存在）
    let _ = dotenv();
    init_tracing();

    let config = ApiConfig::from_env();
    info!("starting API on {}", config.bind);
    if config.expose_tokens {
        tracing::warn!("SF_EXPOSE_TOKENS enabled: verification and reset tokens are returned in responses");
    }

    let user_manager = Arc::new(
        UserManager::new(db::connect(&config.users_database_url).await?)
            .with_password_salt(config.password_salt.clone())
            .with_notifier(Notifier::new(config.public_url.clone()))
            .with_token_exposure(config.expose_tokens),
    );
    user_manager.ensure_schema().await?;

    let product_manager = Arc::new(ProductManager::new(
        db::connect(&config.products_database_url).await?,
    ));
    product_manager.ensure_schema().await?;

    let state = AppState {
        user_manager,
        product_manager,
        login_limiter: Arc::new(RateLimiter::per_minute(config.login_rate_limit)),
        reset_limiter: Arc::new(RateLimiter::per_minute(5)),
    };

    let app = app_router(state, config.cors_origins.clone());
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API stopped");
    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
