//! 领域层统一错误定义
//!
//! 按“如何处置”划分错误类别：校验失败拒绝入库、瞬时失败按策略重试、
//! 永久失败直接进入死信、能力未注册视为致命；其余为序列化与基础设施
//! 变体，便于在各实现层统一转换为 `DomainError`。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 校验与业务规则 ---
    #[error("validation error: {reason}")]
    Validation { reason: String },
    #[error("invalid command: {reason}")]
    InvalidCommand { reason: String },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },

    // --- 投递处置类别 ---
    #[error("transient error: {reason}")]
    Transient { reason: String },
    #[error("permanent error: {reason}")]
    Permanent { reason: String },

    // --- 能力解析 ---
    #[error("capability not registered: {capability}")]
    NotRegistered { capability: String },

    // --- 序列化/事件上抬 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error(
        "upcast failed: type={event_type}, from_version={from_version}, stage={stage:?}, reason={reason}"
    )]
    UpcastFailed {
        event_type: String,
        from_version: usize,
        stage: Option<&'static str>,
        reason: String,
    },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 事件系统 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
    #[error("event handler error: handler={handler}, reason={reason}")]
    Handler { handler: String, reason: String },

    // --- 持久化 ---
    #[error("outbox error: {reason}")]
    Outbox { reason: String },
    #[error("idempotency ledger error: {reason}")]
    Ledger { reason: String },
    #[error("repository error: {reason}")]
    Repository { reason: String },
    #[error("sequence conflict: aggregate={aggregate_id}, expected={expected}, actual={actual}")]
    SequenceConflict {
        aggregate_id: String,
        expected: u64,
        actual: u64,
    },
}

impl DomainError {
    /// 是否可按订阅的重试策略重试。
    ///
    /// 仅基础设施抖动类失败视为瞬时；校验/业务规则/类型错误均为终态，
    /// 由调度器直接送入死信而不消耗重试预算。
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::Transient { .. }
                | DomainError::EventBus { .. }
                | DomainError::Outbox { .. }
                | DomainError::Ledger { .. }
                | DomainError::Repository { .. }
        )
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        DomainError::Validation {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        DomainError::Transient {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        DomainError::Permanent {
            reason: reason.into(),
        }
    }

    pub fn not_registered(capability: impl Into<String>) -> Self {
        DomainError::NotRegistered {
            capability: capability.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        DomainError::NotFound {
            reason: reason.into(),
        }
    }

    pub fn event_bus(reason: impl Into<String>) -> Self {
        DomainError::EventBus {
            reason: reason.into(),
        }
    }

    pub fn handler(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::Handler {
            handler: handler.into(),
            reason: reason.into(),
        }
    }

    pub fn outbox(reason: impl Into<String>) -> Self {
        DomainError::Outbox {
            reason: reason.into(),
        }
    }

    pub fn ledger(reason: impl Into<String>) -> Self {
        DomainError::Ledger {
            reason: reason.into(),
        }
    }

    pub fn repository(reason: impl Into<String>) -> Self {
        DomainError::Repository {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

// ---- Cross-crate conversions for infrastructure convenience ----
// 允许在基础设施层直接使用 `?` 将 sqlx/uuid 等错误转换为 DomainError

#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound {
                reason: "row not found".to_string(),
            },
            other => DomainError::Repository {
                reason: other.to_string(),
            },
        }
    }
}

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::Validation {
            reason: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for DomainError {
    fn from(err: chrono::ParseError) -> Self {
        DomainError::Validation {
            reason: err.to_string(),
        }
    }
}
