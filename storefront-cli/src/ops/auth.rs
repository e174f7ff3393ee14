//! 认证相关 CLI 操作

use super::ui::{
    format_flag, format_time, print_empty, print_header, print_hint, print_kv, print_success,
    print_table_header, print_table_row,
};
use super::users::print_user;
use super::OutputFormat;
use crate::client::{read_envelope, Envelope};
use crossterm::style::Stylize;
use reqwest::Client;
use serde_json::json;
use storefront_core::{
    AuthResponse, ChangePasswordRequest, EmailRequest, LoginActivity, LoginRequest,
    RegisterRequest, ResetPasswordRequest, UserResponse,
};

fn print_auth(title: &str, auth: &AuthResponse) {
    print_header(title);
    print_kv("User ID", &auth.user_id.to_string());
    print_kv("Email", &auth.email.as_str().cyan().to_string());
    print_kv("Role", &auth.role.to_string());
    print_kv("Permissions", &auth.permissions.to_string());
    print_kv(
        "Email verified",
        &format_flag(auth.email_verified, "yes", "no"),
    );
    if !auth.token.is_empty() {
        print_kv("Token", &auth.token);
    }
    println!();
}

/// 仅打印服务端消息（以及演示模式下返回的 token）
fn report_message(
    output: OutputFormat,
    env: Envelope<Option<String>>,
    fallback: &str,
) -> anyhow::Result<()> {
    if output.emit_json(&json!({ "message": env.message, "token": env.data }))? {
        return Ok(());
    }
    print_success(env.message.as_deref().unwrap_or(fallback));
    if let Some(token) = &env.data {
        print_kv("Token", token);
    }
    Ok(())
}

/// 注册账号
pub async fn register(
    client: &Client,
    base: &str,
    req: RegisterRequest,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/register", base);
    let resp = client.post(&url).json(&req).send().await?;
    let env: Envelope<AuthResponse> = read_envelope(resp).await?;

    if output.emit_json(&env.data)? {
        return Ok(());
    }
    print_success(env.message.as_deref().unwrap_or("Registration successful"));
    print_auth("📝 Registered", &env.data);
    if !env.data.token.is_empty() {
        print_hint(&format!(
            "verify with: storefront-cli verify {}",
            env.data.token
        ));
    }
    Ok(())
}

/// 登录
pub async fn login(
    client: &Client,
    base: &str,
    email: &str,
    password: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/login", base);
    let body = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    let resp = client.post(&url).json(&body).send().await?;
    let env: Envelope<AuthResponse> = read_envelope(resp).await?;

    if output.emit_json(&env.data)? {
        return Ok(());
    }
    print_auth("🔐 Login successful", &env.data);
    print_hint(&format!(
        "set SF_USER_ID={} to act as this user",
        env.data.user_id
    ));
    Ok(())
}

/// 验证邮箱
pub async fn verify_email(
    client: &Client,
    base: &str,
    token: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/verify-email", base);
    let resp = client.get(&url).query(&[("token", token)]).send().await?;
    let env: Envelope<bool> = read_envelope(resp).await?;
    if output.emit_json(&json!({ "message": env.message, "verified": env.data }))? {
        return Ok(());
    }
    print_success(env.message.as_deref().unwrap_or("Email verified"));
    Ok(())
}

/// 重新发送验证邮件
pub async fn resend_verification(
    client: &Client,
    base: &str,
    email: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/resend-verification", base);
    let body = EmailRequest {
        email: email.to_string(),
    };
    let env = read_envelope(client.post(&url).json(&body).send().await?).await?;
    report_message(output, env, "Verification email sent")
}

/// 申请重置密码
pub async fn forgot_password(
    client: &Client,
    base: &str,
    email: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/forgot-password", base);
    let body = EmailRequest {
        email: email.to_string(),
    };
    let env = read_envelope(client.post(&url).json(&body).send().await?).await?;
    report_message(output, env, "Password reset requested")
}

/// 使用重置 token 设置新密码
pub async fn reset_password(
    client: &Client,
    base: &str,
    token: &str,
    new_password: &str,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/reset-password", base);
    let body = ResetPasswordRequest {
        token: token.to_string(),
        new_password: new_password.to_string(),
        confirm_password: new_password.to_string(),
    };
    let env: Envelope<bool> = read_envelope(client.post(&url).json(&body).send().await?).await?;
    print_success(env.message.as_deref().unwrap_or("Password reset"));
    Ok(())
}

/// 修改当前用户密码
pub async fn change_password(
    client: &Client,
    base: &str,
    user_id: i64,
    current_password: &str,
    new_password: &str,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/change-password/{}", base, user_id);
    let body = ChangePasswordRequest {
        current_password: current_password.to_string(),
        new_password: new_password.to_string(),
        confirm_password: new_password.to_string(),
    };
    let env: Envelope<bool> = read_envelope(client.post(&url).json(&body).send().await?).await?;
    print_success(env.message.as_deref().unwrap_or("Password changed"));
    Ok(())
}

/// 最近登录记录
pub async fn login_activity(
    client: &Client,
    base: &str,
    user_id: i64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/login-activity/{}", base, user_id);
    let resp = client.get(&url).send().await?;
    let env: Envelope<Vec<LoginActivity>> = read_envelope(resp).await?;

    if output.emit_json(&env.data)? {
        return Ok(());
    }
    print_header(&format!("🕘 Login activity for #{}", user_id));
    if env.data.is_empty() {
        print_empty("no login activity");
        return Ok(());
    }
    let widths = [20, 16, 8, 24];
    print_table_header(&[
        ("TIME", widths[0]),
        ("IP", widths[1]),
        ("RESULT", widths[2]),
        ("REASON", widths[3]),
    ]);
    for row in env.data {
        let time = format_time(&row.login_time);
        let result = if row.is_successful { "ok" } else { "failed" };
        print_table_row(&[
            (&time, widths[0]),
            (row.ip_address.as_deref().unwrap_or("-"), widths[1]),
            (result, widths[2]),
            (row.failure_reason.as_deref().unwrap_or("-"), widths[3]),
        ]);
    }
    println!();
    Ok(())
}

/// 当前调用方资料
pub async fn me(client: &Client, base: &str, output: OutputFormat) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/me", base);
    let resp = client.get(&url).send().await?;
    let env: Envelope<UserResponse> = read_envelope(resp).await?;
    if output.emit_json(&env.data)? {
        return Ok(());
    }
    print_user("🙋 Current user", &env.data);
    Ok(())
}
