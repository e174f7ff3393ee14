//! 角色与权限位掩码，以及管理员的权限管理操作

use super::models::*;
use super::UserManager;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use tracing::{info, instrument};

/// 权限位掩码：每一位代表一种 CRUD 能力
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Permissions(i64);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const VIEW_USERS: Self = Self(1);
    pub const EDIT_USERS: Self = Self(1 << 1);
    pub const DELETE_USERS: Self = Self(1 << 2);
    pub const VIEW_PRODUCTS: Self = Self(1 << 3);
    pub const EDIT_PRODUCTS: Self = Self(1 << 4);
    pub const DELETE_PRODUCTS: Self = Self(1 << 5);
    pub const ALL: Self = Self(63);

    const NAMED: [(Self, &'static str); 6] = [
        (Self::VIEW_USERS, "View Users"),
        (Self::EDIT_USERS, "Edit Users"),
        (Self::DELETE_USERS, "Delete Users"),
        (Self::VIEW_PRODUCTS, "View Products"),
        (Self::EDIT_PRODUCTS, "Edit Products"),
        (Self::DELETE_PRODUCTS, "Delete Products"),
    ];

    /// 拒绝负数与超出 ALL 的位
    pub fn from_bits(bits: i64) -> Option<Self> {
        if bits < 0 || bits & !Self::ALL.0 != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    pub fn bits(self) -> i64 {
        self.0
    }

    /// `other` 的每一位都已置位时返回 true
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", self.names().join(", "))
    }
}

/// 用户角色，序列化为整数（0 = User, 1 = Admin）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum Role {
    #[default]
    User = 0,
    Admin = 1,
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role as i32
    }
}

impl TryFrom<i32> for Role {
    type Error = String;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::User),
            1 => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

impl UserManager {
    /// 覆盖目标用户的权限位（仅管理员调用）
    #[instrument(skip(self))]
    pub async fn update_permissions(&self, user_id: i64, bits: i64) -> Result<User> {
        let permissions = Permissions::from_bits(bits).ok_or_else(|| {
            ServiceError::Validation(format!(
                "Invalid permissions value: {} (allowed range 0-{})",
                bits,
                Permissions::ALL.bits()
            ))
        })?;
        let user = self.get_user(user_id).await?;

        sqlx::query("UPDATE users SET permissions = ?, updated_at = ? WHERE id = ?")
            .bind(permissions)
            .bind(Utc::now())
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        info!(user_id, permissions = %permissions, "updated permissions");
        self.get_user(user_id).await
    }

    /// 提升为管理员并授予全部权限
    #[instrument(skip(self))]
    pub async fn make_admin(&self, user_id: i64) -> Result<User> {
        let user = self.get_user(user_id).await?;
        if user.role == Role::Admin {
            return Err(ServiceError::PolicyViolation(
                "User is already an admin".into(),
            ));
        }

        sqlx::query("UPDATE users SET role = ?, permissions = ?, updated_at = ? WHERE id = ?")
            .bind(Role::Admin)
            .bind(Permissions::ALL)
            .bind(Utc::now())
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        info!(user_id, email = %user.email, "promoted user to admin");
        self.get_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::testing::{manager, register_verified};

    #[test]
    fn contains_requires_every_bit() {
        let p = Permissions::VIEW_USERS | Permissions::VIEW_PRODUCTS;
        assert!(p.contains(Permissions::VIEW_USERS));
        assert!(p.contains(Permissions::VIEW_PRODUCTS));
        assert!(!p.contains(Permissions::EDIT_USERS));
        assert!(!p.contains(Permissions::VIEW_USERS | Permissions::EDIT_USERS));
        assert!(Permissions::ALL.contains(p));
        assert_eq!(p & Permissions::VIEW_USERS, Permissions::VIEW_USERS);
    }

    #[test]
    fn all_is_union_of_every_flag() {
        let mut all = Permissions::NONE;
        for (flag, _) in Permissions::NAMED {
            all |= flag;
        }
        assert_eq!(all, Permissions::ALL);
        assert_eq!(Permissions::ALL.names().len(), 6);
    }

    #[test]
    fn from_bits_rejects_unknown_bits() {
        assert_eq!(Permissions::from_bits(0), Some(Permissions::NONE));
        assert_eq!(Permissions::from_bits(63), Some(Permissions::ALL));
        assert_eq!(Permissions::from_bits(64), None);
        assert_eq!(Permissions::from_bits(-1), None);
    }

    #[test]
    fn role_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Role>("0").unwrap(), Role::User);
        assert!(serde_json::from_str::<Role>("7").is_err());
        assert_eq!(
            serde_json::to_string(&(Permissions::VIEW_PRODUCTS | Permissions::EDIT_PRODUCTS))
                .unwrap(),
            "24"
        );
    }

    #[tokio::test]
    async fn update_permissions_overwrites_bits() {
        let users = manager().await;
        let _admin = register_verified(&users, "admin@test.com").await;
        let user = register_verified(&users, "user@test.com").await;
        assert_eq!(user.permissions, Permissions::NONE);

        let updated = users.update_permissions(user.id, 9).await.unwrap();
        assert!(updated.has_permission(Permissions::VIEW_USERS));
        assert!(updated.has_permission(Permissions::VIEW_PRODUCTS));
        assert!(!updated.has_permission(Permissions::EDIT_PRODUCTS));

        let err = users.update_permissions(user.id, 128).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = users.update_permissions(9999, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn make_admin_grants_everything_once() {
        let users = manager().await;
        let _admin = register_verified(&users, "admin@test.com").await;
        let user = register_verified(&users, "user@test.com").await;

        let promoted = users.make_admin(user.id).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert_eq!(promoted.permissions, Permissions::ALL);

        let err = users.make_admin(user.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::PolicyViolation(m) if m == "User is already an admin"));
    }
}
