use arena_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("capability not registered: {capability}")]
    NotRegistered { capability: String },

    #[error("ambiguous capability registration: {capability}: {reason}")]
    AmbiguousRegistration { capability: String, reason: String },

    #[error("capability already registered: {capability}@{version}")]
    AlreadyRegistered { capability: String, version: String },

    #[error("capability type mismatch: {capability}: expected {expected}")]
    TypeMismatch {
        capability: String,
        expected: &'static str,
    },
}

/// 处理器内部产生的 `AppError` 需要降级为领域错误才能进入重试/死信判定。
/// 能力未注册属于装配缺陷，映射为不可重试的 `NotRegistered`。
impl From<AppError> for DomainError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(inner) => inner,
            AppError::Validation(reason) => DomainError::validation(reason),
            AppError::NotRegistered { capability } => DomainError::not_registered(capability),
            AppError::AmbiguousRegistration { capability, reason } => {
                DomainError::permanent(format!("ambiguous capability {capability}: {reason}"))
            }
            AppError::AlreadyRegistered {
                capability,
                version,
            } => DomainError::permanent(format!("capability {capability}@{version} re-registered")),
            AppError::TypeMismatch {
                capability,
                expected,
            } => DomainError::TypeMismatch {
                expected: expected.to_string(),
                found: format!("capability {capability}"),
            },
        }
    }
}
