//! 密码管理：长度校验、修改密码

use super::crypto::verify_password;
use super::models::*;
use super::UserManager;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use tracing::{info, instrument, warn};
use validator::Validate;

impl UserManager {
    /// 密码长度 6-100（按字符计）
    pub(super) fn validate_password_length(password: &str) -> Result<()> {
        let len = password.chars().count();
        if !(6..=100).contains(&len) {
            return Err(ServiceError::Validation(
                "Password must be 6-100 characters".into(),
            ));
        }
        Ok(())
    }

    /// 本人修改密码，需校验当前密码
    #[instrument(skip(self, req))]
    pub async fn change_password(&self, user_id: i64, req: ChangePasswordRequest) -> Result<()> {
        req.validate()?;
        let user = self.get_user(user_id).await?;

        if !verify_password(&req.current_password, &self.password_salt, &user.password_hash) {
            warn!(user_id, "change password rejected: wrong current password");
            return Err(ServiceError::PolicyViolation(
                "Current password is incorrect".into(),
            ));
        }

        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(self.hash(&req.new_password))
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!(user_id, "password changed");
        Ok(())
    }
}
