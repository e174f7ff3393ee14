//! 用户管理器：核心结构、表结构与用户 CRUD 操作

use super::crypto::{hash_password, DEFAULT_PASSWORD_SALT};
use super::models::*;
use super::permissions::{Permissions, Role};
use crate::error::{Result, ServiceError};
use crate::notify::Notifier;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::{info, instrument};
use validator::Validate;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT,
        last_name TEXT,
        role INTEGER NOT NULL DEFAULT 0,
        permissions INTEGER NOT NULL DEFAULT 0,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        email_verified BOOLEAN NOT NULL DEFAULT 0,
        email_verification_token TEXT,
        email_verification_expiry TEXT,
        password_reset_token TEXT,
        password_reset_expiry TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT,
        last_login_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_users_verification_token ON users (email_verification_token)",
    "CREATE INDEX IF NOT EXISTS ix_users_reset_token ON users (password_reset_token)",
    r#"
    CREATE TABLE IF NOT EXISTS login_activities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        login_time TEXT NOT NULL,
        ip_address TEXT,
        user_agent TEXT,
        is_successful BOOLEAN NOT NULL,
        failure_reason TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_login_activities_user_id ON login_activities (user_id)",
    "CREATE INDEX IF NOT EXISTS ix_login_activities_login_time ON login_activities (login_time)",
];

/// 用户管理器
#[derive(Debug, Clone)]
pub struct UserManager {
    pub(super) pool: SqlitePool,
    /// 密码哈希盐
    pub(super) password_salt: String,
    pub(super) notifier: Notifier,
    /// 演示模式：在响应中返回验证 / 重置 token
    pub(super) expose_tokens: bool,
    /// 邮箱验证 token 有效期
    pub(super) verification_ttl: Duration,
    /// 密码重置 token 有效期
    pub(super) reset_ttl: Duration,
}

// ============================================================================
// 构造器和配置
// ============================================================================

impl UserManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            password_salt: DEFAULT_PASSWORD_SALT.to_string(),
            notifier: Notifier::default(),
            expose_tokens: true,
            verification_ttl: Duration::hours(24),
            reset_ttl: Duration::hours(1),
        }
    }

    pub fn with_password_salt(mut self, salt: impl Into<String>) -> Self {
        self.password_salt = salt.into();
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_token_exposure(mut self, expose: bool) -> Self {
        self.expose_tokens = expose;
        self
    }

    /// 配置 token 有效期
    pub fn with_ttl(mut self, verification_ttl: Duration, reset_ttl: Duration) -> Self {
        self.verification_ttl = verification_ttl;
        self.reset_ttl = reset_ttl;
        self
    }

    /// 建表（幂等）
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

// ============================================================================
// 内部辅助方法
// ============================================================================

impl UserManager {
    pub(super) fn hash(&self, password: &str) -> String {
        hash_password(password, &self.password_salt)
    }

    pub(super) fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// 演示模式下返回 token，否则返回空串
    pub(super) fn reveal(&self, token: &str) -> String {
        if self.expose_tokens {
            token.to_string()
        } else {
            String::new()
        }
    }

    pub(super) async fn email_taken(&self, email: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub(super) async fn find_by_column(&self, column: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT * FROM users WHERE {} = ?", column);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

// ============================================================================
// 用户 CRUD 操作
// ============================================================================

impl UserManager {
    /// 管理端创建用户：邮箱视为已验证
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User> {
        req.validate()?;
        let permissions = match req.permissions {
            Some(bits) => Permissions::from_bits(bits).ok_or_else(|| {
                ServiceError::Validation(format!("Invalid permissions value: {}", bits))
            })?,
            None => Permissions::NONE,
        };

        let email = Self::normalize_email(&req.email);
        if self.email_taken(&email).await? {
            return Err(ServiceError::AlreadyExists("Email already exists".into()));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role, permissions,
                               is_active, email_verified, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, 1, ?)
            "#,
        )
        .bind(&email)
        .bind(self.hash(&req.password))
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(Role::User)
        .bind(permissions)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::unique_violation(e, "Email already exists"))?;

        let user = self.get_user(result.last_insert_rowid()).await?;
        info!(user_id = user.id, email = %user.email, "created user");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i64) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(ServiceError::user_not_found)
    }

    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by_column("email", &Self::normalize_email(email))
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn count_users(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// 更新用户资料。修改邮箱会重新校验唯一性并重置验证状态。
    #[instrument(skip(self, req))]
    pub async fn update_user(&self, id: i64, req: UpdateUserRequest) -> Result<User> {
        req.validate()?;
        let mut user = self.get_user(id).await?;

        if let Some(email) = req.email.as_deref() {
            let email = Self::normalize_email(email);
            if email != user.email {
                if self.email_taken(&email).await? {
                    return Err(ServiceError::AlreadyExists("Email already exists".into()));
                }
                user.email = email;
                user.email_verified = false;
            }
        }
        if let Some(first_name) = req.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = req.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(is_active) = req.is_active {
            user.is_active = is_active;
        }
        if let Some(password) = req.password.filter(|p| !p.is_empty()) {
            Self::validate_password_length(&password)?;
            user.password_hash = self.hash(&password);
        }

        sqlx::query(
            r#"
            UPDATE users
            SET email = ?, first_name = ?, last_name = ?, is_active = ?, email_verified = ?,
                password_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(&user.password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::unique_violation(e, "Email already exists"))?;

        info!(user_id = id, "updated user");
        self.get_user(id).await
    }

    /// 删除用户，登录记录随外键级联删除
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::user_not_found());
        }
        info!(user_id = id, "deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::testing::{manager, register_verified};

    fn create_req(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.into(),
            password: "Password123!".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            permissions: Some(Permissions::VIEW_PRODUCTS.bits()),
        }
    }

    #[tokio::test]
    async fn admin_created_users_are_preverified() {
        let users = manager().await;
        let user = users.create_user(create_req("Ada@Example.com")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert!(user.email_verified);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.permissions, Permissions::VIEW_PRODUCTS);

        let err = users.create_user(create_req("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(m) if m == "Email already exists"));
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let users = manager().await;
        let mut req = create_req("not-an-email");
        assert!(matches!(
            users.create_user(req.clone()).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
        req.email = "ok@example.com".into();
        req.permissions = Some(100);
        assert!(matches!(
            users.create_user(req).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn email_change_requires_reverification() {
        let users = manager().await;
        let user = register_verified(&users, "first@test.com").await;
        let _other = register_verified(&users, "second@test.com").await;
        assert!(user.email_verified);

        let err = users
            .update_user(
                user.id,
                UpdateUserRequest {
                    email: Some("SECOND@test.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));

        let updated = users
            .update_user(
                user.id,
                UpdateUserRequest {
                    email: Some("renamed@test.com".into()),
                    first_name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "renamed@test.com");
        assert_eq!(updated.first_name.as_deref(), Some("Renamed"));
        assert!(!updated.email_verified);
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn same_email_keeps_verification() {
        let users = manager().await;
        let user = register_verified(&users, "same@test.com").await;
        let updated = users
            .update_user(
                user.id,
                UpdateUserRequest {
                    email: Some("Same@Test.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.email_verified);
    }

    #[tokio::test]
    async fn update_password_rehashes() {
        let users = manager().await;
        let user = register_verified(&users, "pw@test.com").await;
        let updated = users
            .update_user(
                user.id,
                UpdateUserRequest {
                    password: Some("NewPass99".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_ne!(updated.password_hash, user.password_hash);

        let unchanged = users
            .update_user(
                user.id,
                UpdateUserRequest {
                    password: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unchanged.password_hash, updated.password_hash);

        let err = users
            .update_user(
                user.id,
                UpdateUserRequest {
                    password: Some("123".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_cascades_login_activity() {
        let users = manager().await;
        let user = register_verified(&users, "gone@test.com").await;
        users
            .login("gone@test.com", "Password123!", &ClientContext::default())
            .await
            .unwrap();
        assert_eq!(users.login_activity(user.id).await.unwrap().len(), 1);

        users.delete_user(user.id).await.unwrap();
        assert!(matches!(
            users.get_user(user.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(users.login_activity(user.id).await.unwrap().is_empty());
        assert!(matches!(
            users.delete_user(user.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
