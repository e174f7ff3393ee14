//! 邮件通知：渲染验证 / 重置链接并写入日志（不发送 SMTP）

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Verification,
    PasswordReset,
}

/// 已渲染的邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub to: String,
    pub subject: String,
    pub link: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    public_url: String,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

impl Notifier {
    pub fn new(public_url: impl Into<String>) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self { public_url }
    }

    pub fn send_verification(&self, to: &str, name: Option<&str>, token: &str) -> Message {
        let link = format!("{}/?verify={}", self.public_url, token);
        let body = format!(
            "Hello {},\n\nPlease verify your email address by opening the link below:\n{}\n\nThe link expires in 24 hours.",
            name.unwrap_or(to),
            link
        );
        self.deliver(Message {
            kind: MessageKind::Verification,
            to: to.to_string(),
            subject: "Verify your email address".into(),
            link,
            body,
        })
    }

    pub fn send_password_reset(&self, to: &str, name: Option<&str>, token: &str) -> Message {
        let link = format!("{}/?reset={}", self.public_url, token);
        let body = format!(
            "Hello {},\n\nA password reset was requested for your account. Open the link below to choose a new password:\n{}\n\nThe link expires in 1 hour. If you did not request this, ignore this email.",
            name.unwrap_or(to),
            link
        );
        self.deliver(Message {
            kind: MessageKind::PasswordReset,
            to: to.to_string(),
            subject: "Reset your password".into(),
            link,
            body,
        })
    }

    fn deliver(&self, message: Message) -> Message {
        info!(
            to = %message.to,
            subject = %message.subject,
            link = %message.link,
            "email message rendered"
        );
        message
    }
}
