//! 密码哈希与随机 token 工具函数

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// 默认密码盐，与已有数据保持兼容
pub const DEFAULT_PASSWORD_SALT: &str = "MicroservicesDemo_Salt_2024";

/// SHA-256(password || salt)，标准 base64 编码
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// 常量时间比较，避免通过响应时间推断哈希
pub fn verify_password(password: &str, salt: &str, hash: &str) -> bool {
    let computed = hash_password(password, salt);
    computed.as_bytes().ct_eq(hash.as_bytes()).into()
}

/// 32 字节随机数，URL 安全 base64（无填充）
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_and_stable() {
        let a = hash_password("Password123!", DEFAULT_PASSWORD_SALT);
        let b = hash_password("Password123!", DEFAULT_PASSWORD_SALT);
        let c = hash_password("Password123!", "another-salt");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // 32 字节摘要的标准 base64 长度
        assert_eq!(a.len(), 44);
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("secret1", DEFAULT_PASSWORD_SALT);
        assert!(verify_password("secret1", DEFAULT_PASSWORD_SALT, &hash));
        assert!(!verify_password("secret2", DEFAULT_PASSWORD_SALT, &hash));
        assert!(!verify_password("secret1", "other", &hash));
    }

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
