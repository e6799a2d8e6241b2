//! 幂等台账（Idempotency Ledger）
//!
//! 以 `(event_id, handler_id)` 为键记录“该处理器已成功处理该事件”。
//! 台账将至少一次投递收敛为至多一次可见副作用：
//! - 调度器在执行前查询 `has_processed`，命中则视为成功跳过；
//! - 处理成功后、确认投递前写入 `record_processed`；
//! - 重复写入返回 `AlreadyRecorded`，是成功信号而非错误。
//!
use crate::error::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

/// 台账记录：一条 (event, handler) 的处理凭证
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEventRecord {
    event_id: String,
    handler_id: String,
    applied_at: DateTime<Utc>,
}

impl ProcessedEventRecord {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }

    pub fn applied_at(&self) -> DateTime<Utc> {
        self.applied_at
    }
}

/// 写入结果：首次记录或已存在（两者都代表副作用已生效）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    Recorded,
    AlreadyRecorded,
}

#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    /// 该 (event, handler) 是否已有处理凭证
    async fn has_processed(&self, event_id: &str, handler_id: &str) -> DomainResult<bool>;

    /// 写入处理凭证；已存在时返回 `AlreadyRecorded` 而非错误
    async fn record_processed(
        &self,
        event_id: &str,
        handler_id: &str,
    ) -> DomainResult<LedgerStatus>;
}

#[async_trait]
impl<T> IdempotencyLedger for std::sync::Arc<T>
where
    T: IdempotencyLedger + ?Sized,
{
    async fn has_processed(&self, event_id: &str, handler_id: &str) -> DomainResult<bool> {
        (**self).has_processed(event_id, handler_id).await
    }

    async fn record_processed(
        &self,
        event_id: &str,
        handler_id: &str,
    ) -> DomainResult<LedgerStatus> {
        (**self).record_processed(event_id, handler_id).await
    }
}

/// 内存版幂等台账，适用于测试与本地开发
#[derive(Default)]
pub struct InMemoryIdempotencyLedger {
    entries: DashMap<(String, String), ProcessedEventRecord>,
}

impl InMemoryIdempotencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前凭证条数（测试断言用）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl IdempotencyLedger for InMemoryIdempotencyLedger {
    async fn has_processed(&self, event_id: &str, handler_id: &str) -> DomainResult<bool> {
        Ok(self
            .entries
            .contains_key(&(event_id.to_string(), handler_id.to_string())))
    }

    async fn record_processed(
        &self,
        event_id: &str,
        handler_id: &str,
    ) -> DomainResult<LedgerStatus> {
        let key = (event_id.to_string(), handler_id.to_string());
        match self.entries.entry(key) {
            Entry::Occupied(_) => Ok(LedgerStatus::AlreadyRecorded),
            Entry::Vacant(slot) => {
                slot.insert(ProcessedEventRecord {
                    event_id: event_id.to_string(),
                    handler_id: handler_id.to_string(),
                    applied_at: Utc::now(),
                });
                Ok(LedgerStatus::Recorded)
            }
        }
    }
}
