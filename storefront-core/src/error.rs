use thiserror::Error;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// 业务错误。各变体携带的字符串即返回给客户端的提示信息。
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidToken(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    PolicyViolation(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn user_not_found() -> Self {
        Self::NotFound("User not found".into())
    }

    pub fn product_not_found() -> Self {
        Self::NotFound("Product not found".into())
    }

    /// 将唯一约束冲突转换为带业务提示的 AlreadyExists，其余错误原样保留。
    pub(crate) fn unique_violation(err: sqlx::Error, message: &str) -> Self {
        let is_unique = err
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or(false);
        if is_unique {
            Self::AlreadyExists(message.to_string())
        } else {
            Self::Database(err)
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("record not found".into()),
            other => Self::unique_violation(other, "record already exists"),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{}: invalid value", field))
                })
            })
            .collect::<Vec<_>>();
        messages.sort();
        Self::Validation(messages.join("; "))
    }
}
