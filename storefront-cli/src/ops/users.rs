//! 用户管理 CLI 操作

use super::ui::{
    format_flag, format_time, print_empty, print_header, print_kv, print_success,
    print_table_header, print_table_row,
};
use super::OutputFormat;
use crate::client::{read_envelope, Envelope};
use crossterm::style::Stylize;
use reqwest::Client;
use storefront_core::{CreateUserRequest, UpdatePermissionsRequest, UpdateUserRequest, UserResponse};

fn display_name(user: &UserResponse) -> String {
    let name = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        "-".into()
    } else {
        name
    }
}

/// 打印单个用户
pub fn print_user(title: &str, user: &UserResponse) {
    print_header(title);
    print_kv("ID", &user.id.to_string());
    print_kv("Email", &user.email.as_str().cyan().to_string());
    print_kv("Name", &display_name(user));
    print_kv("Role", &user.role.to_string());
    print_kv(
        "Permissions",
        &format!("{} ({})", user.permissions, user.permissions.bits()),
    );
    print_kv("Active", &format_flag(user.is_active, "yes", "no"));
    print_kv(
        "Email verified",
        &format_flag(user.email_verified, "yes", "no"),
    );
    print_kv("Created", &format_time(&user.created_at));
    if let Some(at) = &user.last_login_at {
        print_kv("Last login", &format_time(at));
    }
    println!();
}

fn report(output: OutputFormat, env: Envelope<UserResponse>, title: &str) -> anyhow::Result<()> {
    if output.emit_json(&env.data)? {
        return Ok(());
    }
    if let Some(message) = &env.message {
        print_success(message);
    }
    print_user(title, &env.data);
    Ok(())
}

/// 列出所有用户
pub async fn list_users(client: &Client, base: &str, output: OutputFormat) -> anyhow::Result<()> {
    let url = format!("{}/api/users", base);
    let resp = client.get(&url).send().await?;
    let env: Envelope<Vec<UserResponse>> = read_envelope(resp).await?;

    if output.emit_json(&env.data)? {
        return Ok(());
    }
    print_header("👥 Users");
    if env.data.is_empty() {
        print_empty("no users");
        return Ok(());
    }
    let widths = [6, 32, 8, 8, 12];
    print_table_header(&[
        ("ID", widths[0]),
        ("EMAIL", widths[1]),
        ("ROLE", widths[2]),
        ("ACTIVE", widths[3]),
        ("PERMISSIONS", widths[4]),
    ]);
    for user in env.data {
        let id = user.id.to_string();
        let role = user.role.to_string();
        let active = if user.is_active { "yes" } else { "no" };
        let perms = user.permissions.bits().to_string();
        print_table_row(&[
            (&id, widths[0]),
            (&user.email, widths[1]),
            (&role, widths[2]),
            (active, widths[3]),
            (&perms, widths[4]),
        ]);
    }
    println!();
    Ok(())
}

/// 获取用户详情
pub async fn get_user(
    client: &Client,
    base: &str,
    id: i64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/users/{}", base, id);
    let resp = client.get(&url).send().await?;
    let env = read_envelope(resp).await?;
    report(output, env, &format!("👤 User #{}", id))
}

/// 创建用户
pub async fn create_user(
    client: &Client,
    base: &str,
    user: CreateUserRequest,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/users", base);
    let resp = client.post(&url).json(&user).send().await?;
    let env = read_envelope(resp).await?;
    report(output, env, "👤 User created")
}

/// 更新用户，未提供的字段不会发送
pub async fn update_user(
    client: &Client,
    base: &str,
    id: i64,
    changes: UpdateUserRequest,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/users/{}", base, id);
    let resp = client.put(&url).json(&changes).send().await?;
    let env = read_envelope(resp).await?;
    report(output, env, &format!("👤 User #{}", id))
}

/// 删除用户
pub async fn delete_user(client: &Client, base: &str, id: i64) -> anyhow::Result<()> {
    let url = format!("{}/api/users/{}", base, id);
    let resp = client.delete(&url).send().await?;
    let env: Envelope<bool> = read_envelope(resp).await?;
    print_success(env.message.as_deref().unwrap_or("User deleted"));
    Ok(())
}

/// 覆盖用户权限位（管理员）
pub async fn set_permissions(
    client: &Client,
    base: &str,
    id: i64,
    permissions: i64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/update-permissions", base);
    let body = UpdatePermissionsRequest {
        user_id: id,
        permissions,
    };
    let resp = client.post(&url).json(&body).send().await?;
    let env = read_envelope(resp).await?;
    report(output, env, &format!("🔑 User #{}", id))
}

/// 提升为管理员
pub async fn make_admin(
    client: &Client,
    base: &str,
    id: i64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/auth/make-admin/{}", base, id);
    let resp = client.post(&url).send().await?;
    let env = read_envelope(resp).await?;
    report(output, env, &format!("🔑 User #{}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::Role;

    fn user(first: Option<&str>, last: Option<&str>) -> UserResponse {
        serde_json::from_value(serde_json::json!({
            "id": 3,
            "email": "ada@shop.com",
            "firstName": first,
            "lastName": last,
            "role": 1,
            "permissions": 63,
            "isActive": true,
            "emailVerified": true,
            "createdAt": "2026-01-02T03:04:05Z",
            "updatedAt": null,
            "lastLoginAt": null,
        }))
        .unwrap()
    }

    #[test]
    fn server_user_payload_decodes() {
        let u = user(Some("Ada"), None);
        assert_eq!(u.role, Role::Admin);
        assert_eq!(u.permissions.names().len(), 6);
    }

    #[test]
    fn display_name_joins_present_parts() {
        assert_eq!(display_name(&user(Some("Ada"), Some("Lovelace"))), "Ada Lovelace");
        assert_eq!(display_name(&user(None, Some("Lovelace"))), "Lovelace");
        assert_eq!(display_name(&user(None, None)), "-");
    }
}
