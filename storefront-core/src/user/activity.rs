//! 登录审计记录

use super::models::*;
use super::UserManager;
use crate::error::Result;
use chrono::Utc;
use tracing::instrument;

const MAX_IP_LEN: usize = 50;
const MAX_USER_AGENT_LEN: usize = 500;
const MAX_REASON_LEN: usize = 255;
/// 查询时返回的最大条数
const ACTIVITY_LIMIT: i64 = 20;

fn clip(value: Option<&str>, max: usize) -> Option<String> {
    value.map(|v| v.chars().take(max).collect())
}

impl UserManager {
    pub(super) async fn record_login(
        &self,
        user_id: i64,
        ctx: &ClientContext,
        is_successful: bool,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO login_activities (user_id, login_time, ip_address, user_agent,
                                          is_successful, failure_reason)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(clip(ctx.ip_address.as_deref(), MAX_IP_LEN))
        .bind(clip(ctx.user_agent.as_deref(), MAX_USER_AGENT_LEN))
        .bind(is_successful)
        .bind(clip(failure_reason, MAX_REASON_LEN))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 最近 20 条登录记录，按时间倒序
    #[instrument(skip(self))]
    pub async fn login_activity(&self, user_id: i64) -> Result<Vec<LoginActivity>> {
        let rows = sqlx::query_as::<_, LoginActivity>(
            r#"
            SELECT * FROM login_activities
            WHERE user_id = ?
            ORDER BY login_time DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(ACTIVITY_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
