//! 认证流程：注册、登录、邮箱验证、找回 / 重置密码

use super::crypto::{generate_token, verify_password};
use super::models::*;
use super::permissions::{Permissions, Role};
use super::UserManager;
use crate::error::{Result, ServiceError};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_VERIFICATION_TOKEN: &str = "Invalid or expired verification token";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

fn is_live(expiry: Option<DateTime<Utc>>) -> bool {
    expiry.map(|at| at > Utc::now()).unwrap_or(false)
}

impl UserManager {
    /// 注册新用户。库中第一个用户自动成为管理员并获得全部权限。
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse> {
        req.validate()?;
        let email = Self::normalize_email(&req.email);
        if self.email_taken(&email).await? {
            return Err(ServiceError::AlreadyExists("Email already registered".into()));
        }

        let token = generate_token();
        let expiry = Utc::now() + self.verification_ttl;

        // 角色与权限在同一条语句中根据表是否为空决定
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role, permissions,
                               is_active, email_verified, email_verification_token,
                               email_verification_expiry, created_at)
            SELECT ?, ?, ?, ?,
                   CASE WHEN EXISTS (SELECT 1 FROM users) THEN ? ELSE ? END,
                   CASE WHEN EXISTS (SELECT 1 FROM users) THEN ? ELSE ? END,
                   1, 0, ?, ?, ?
            "#,
        )
        .bind(&email)
        .bind(self.hash(&req.password))
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(Role::User)
        .bind(Role::Admin)
        .bind(Permissions::NONE)
        .bind(Permissions::ALL)
        .bind(&token)
        .bind(expiry)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::unique_violation(e, "Email already registered"))?;

        let user = self.get_user(result.last_insert_rowid()).await?;
        self.notifier
            .send_verification(&user.email, user.first_name.as_deref(), &token);

        info!(user_id = user.id, role = %user.role, "user registered");
        Ok(AuthResponse::new(&user, self.reveal(&token)))
    }

    /// 用户登录，每次密码校验后都会写入登录记录
    #[instrument(skip(self, password, ctx))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ctx: &ClientContext,
    ) -> Result<AuthResponse> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.into()))?;

        if !verify_password(password, &self.password_salt, &user.password_hash) {
            warn!(user_id = user.id, "login failed: invalid password");
            self.record_login(user.id, ctx, false, Some("Invalid password"))
                .await?;
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        if !user.is_active {
            warn!(user_id = user.id, "login failed: account deactivated");
            self.record_login(user.id, ctx, false, Some("Account is deactivated"))
                .await?;
            return Err(ServiceError::Unauthorized("Account is deactivated".into()));
        }

        if !user.email_verified {
            warn!(user_id = user.id, "login failed: email not verified");
            self.record_login(user.id, ctx, false, Some("Email not verified"))
                .await?;
            return Err(ServiceError::Unauthorized(
                "Please verify your email before logging in".into(),
            ));
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(now)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        self.record_login(user.id, ctx, true, None).await?;

        let user = self.get_user(user.id).await?;
        info!(user_id = user.id, "user logged in");
        Ok(AuthResponse::new(&user, generate_token()))
    }

    /// 用验证 token 标记邮箱已验证（一次性）
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> Result<User> {
        let invalid = || ServiceError::InvalidToken(INVALID_VERIFICATION_TOKEN.into());
        if token.is_empty() {
            return Err(invalid());
        }
        let user = self
            .find_by_column("email_verification_token", token)
            .await?
            .ok_or_else(invalid)?;
        if !is_live(user.email_verification_expiry) {
            warn!(user_id = user.id, "verification token expired");
            return Err(invalid());
        }

        sqlx::query(
            r#"
            UPDATE users
            SET email_verified = 1, email_verification_token = NULL,
                email_verification_expiry = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        info!(user_id = user.id, "email verified");
        self.get_user(user.id).await
    }

    /// 重新生成验证 token。邮箱不存在时静默成功，返回值为演示模式下的 token。
    #[instrument(skip(self))]
    pub async fn resend_verification(&self, email: &str) -> Result<Option<String>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        if user.email_verified {
            return Err(ServiceError::PolicyViolation(
                "Email is already verified".into(),
            ));
        }

        let token = generate_token();
        sqlx::query(
            r#"
            UPDATE users
            SET email_verification_token = ?, email_verification_expiry = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&token)
        .bind(Utc::now() + self.verification_ttl)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        self.notifier
            .send_verification(&user.email, user.first_name.as_deref(), &token);
        info!(user_id = user.id, "verification token reissued");
        Ok(self.expose_tokens.then_some(token))
    }

    /// 生成密码重置 token。邮箱不存在时同样返回成功，避免泄露账户是否存在。
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>> {
        let Some(user) = self.find_by_email(email).await? else {
            info!("password reset requested for unknown email");
            return Ok(None);
        };

        let token = generate_token();
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = ?, password_reset_expiry = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&token)
        .bind(Utc::now() + self.reset_ttl)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        self.notifier
            .send_password_reset(&user.email, user.first_name.as_deref(), &token);
        info!(user_id = user.id, "password reset token issued");
        Ok(self.expose_tokens.then_some(token))
    }

    /// 用重置 token 设置新密码，token 使用后清除
    #[instrument(skip(self, req))]
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<()> {
        req.validate()?;
        let invalid = || ServiceError::InvalidToken(INVALID_RESET_TOKEN.into());
        let user = self
            .find_by_column("password_reset_token", &req.token)
            .await?
            .ok_or_else(invalid)?;
        if !is_live(user.password_reset_expiry) {
            warn!(user_id = user.id, "reset token expired");
            return Err(invalid());
        }

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, password_reset_token = NULL, password_reset_expiry = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(self.hash(&req.new_password))
        .bind(Utc::now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        info!(user_id = user.id, "password reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::testing::{manager, register_request, register_verified};
    use chrono::Duration;

    #[tokio::test]
    async fn first_user_becomes_admin() {
        let users = manager().await;
        let first = users.register(register_request("Root@Test.com")).await.unwrap();
        assert_eq!(first.email, "root@test.com");
        assert_eq!(first.role, Role::Admin);
        assert_eq!(first.permissions, Permissions::ALL);
        assert!(!first.email_verified);
        assert!(!first.token.is_empty());

        let second = users.register(register_request("user@test.com")).await.unwrap();
        assert_eq!(second.role, Role::User);
        assert_eq!(second.permissions, Permissions::NONE);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_input() {
        let users = manager().await;
        users.register(register_request("dup@test.com")).await.unwrap();
        let err = users
            .register(register_request("DUP@test.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(m) if m == "Email already registered"));

        let mut req = register_request("short@test.com");
        req.password = "123".into();
        req.confirm_password = "123".into();
        assert!(matches!(
            users.register(req).await.unwrap_err(),
            ServiceError::Validation(_)
        ));

        let mut req = register_request("mismatch@test.com");
        req.confirm_password = "Different1".into();
        assert!(matches!(
            users.register(req).await.unwrap_err(),
            ServiceError::Validation(m) if m == "Passwords do not match"
        ));
    }

    #[tokio::test]
    async fn hidden_tokens_are_not_returned() {
        let users = manager().await.with_token_exposure(false);
        let resp = users.register(register_request("quiet@test.com")).await.unwrap();
        assert!(resp.token.is_empty());
        assert_eq!(users.forgot_password("quiet@test.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn login_checks_run_in_order() {
        let users = manager().await;
        let ctx = ClientContext {
            ip_address: Some("10.0.0.1".into()),
            user_agent: Some("tests".into()),
        };

        let err = users.login("nobody@test.com", "x", &ctx).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(m) if m == INVALID_CREDENTIALS));

        let pending = users.register(register_request("pending@test.com")).await.unwrap();
        let err = users
            .login("pending@test.com", "wrong-password", &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(m) if m == INVALID_CREDENTIALS));

        let err = users
            .login("pending@test.com", "Password123!", &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Unauthorized(m) if m == "Please verify your email before logging in"
        ));

        let activity = users.login_activity(pending.user_id).await.unwrap();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].failure_reason.as_deref(), Some("Email not verified"));
        assert_eq!(activity[1].failure_reason.as_deref(), Some("Invalid password"));
        assert_eq!(activity[0].ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn deactivated_accounts_cannot_login() {
        let users = manager().await;
        let user = register_verified(&users, "off@test.com").await;
        users
            .update_user(
                user.id,
                UpdateUserRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = users
            .login("off@test.com", "Password123!", &ClientContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(m) if m == "Account is deactivated"));
    }

    #[tokio::test]
    async fn successful_login_records_activity() {
        let users = manager().await;
        let user = register_verified(&users, "ok@test.com").await;
        assert!(user.last_login_at.is_none());

        let resp = users
            .login("OK@test.com", "Password123!", &ClientContext::default())
            .await
            .unwrap();
        assert_eq!(resp.user_id, user.id);
        assert_eq!(resp.token.len(), 43);
        assert!(resp.email_verified);

        let user = users.get_user(user.id).await.unwrap();
        assert!(user.last_login_at.is_some());
        let activity = users.login_activity(user.id).await.unwrap();
        assert!(activity[0].is_successful);
        assert!(activity[0].failure_reason.is_none());
    }

    #[tokio::test]
    async fn verification_token_is_single_use() {
        let users = manager().await;
        let resp = users.register(register_request("v@test.com")).await.unwrap();

        let user = users.verify_email(&resp.token).await.unwrap();
        assert!(user.email_verified);
        assert!(user.email_verification_token.is_none());

        let err = users.verify_email(&resp.token).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken(m) if m == INVALID_VERIFICATION_TOKEN));
        assert!(users.verify_email("").await.is_err());
    }

    #[tokio::test]
    async fn expired_verification_token_is_rejected() {
        let users = manager()
            .await
            .with_ttl(Duration::seconds(-1), Duration::hours(1));
        let resp = users.register(register_request("late@test.com")).await.unwrap();
        let err = users.verify_email(&resp.token).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn resend_rotates_token() {
        let users = manager().await;
        let resp = users.register(register_request("r@test.com")).await.unwrap();

        assert_eq!(users.resend_verification("ghost@test.com").await.unwrap(), None);

        let fresh = users
            .resend_verification("r@test.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(fresh, resp.token);
        assert!(users.verify_email(&resp.token).await.is_err());
        users.verify_email(&fresh).await.unwrap();

        let err = users.resend_verification("r@test.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::PolicyViolation(m) if m == "Email is already verified"));
    }

    #[tokio::test]
    async fn reset_password_flow() {
        let users = manager().await;
        let _user = register_verified(&users, "reset@test.com").await;

        assert_eq!(users.forgot_password("ghost@test.com").await.unwrap(), None);
        let token = users
            .forgot_password("reset@test.com")
            .await
            .unwrap()
            .unwrap();

        let req = ResetPasswordRequest {
            token: token.clone(),
            new_password: "Brand-new1".into(),
            confirm_password: "Brand-new1".into(),
        };
        users.reset_password(req.clone()).await.unwrap();

        let ctx = ClientContext::default();
        assert!(users.login("reset@test.com", "Brand-new1", &ctx).await.is_ok());

        let err = users.reset_password(req).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken(m) if m == INVALID_RESET_TOKEN));
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let users = manager()
            .await
            .with_ttl(Duration::hours(24), Duration::seconds(-1));
        let _user = register_verified(&users, "slow@test.com").await;
        let token = users
            .forgot_password("slow@test.com")
            .await
            .unwrap()
            .unwrap();
        let err = users
            .reset_password(ResetPasswordRequest {
                token,
                new_password: "Brand-new1".into(),
                confirm_password: "Brand-new1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken(_)));
    }
}
