//! 事务性 Outbox
//!
//! 事件记录与聚合变更在同一提交单元内落入 Outbox（`Pending`），
//! 由中继周期性取出并发布至总线，发布被总线接受后标记 `Published`。
//! 状态机只进不退：`Pending -> Published` 之后不再回退；
//! `Failed` 仅用于校验不通过的记录（不再重试，等待人工处置）。
//! 发布语义为至少一次：提交后发布前的进程崩溃由重启后的中继补发。
//!
use crate::error::{DomainError, DomainResult};
use crate::persist::EventRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outbox 条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    /// 已提交待发布
    Pending,
    /// 总线已接受，不再回退
    Published,
    /// 校验不通过被拒，不参与重发
    Failed,
}

/// Outbox 条目：事件记录的不可变快照加投递状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    record: EventRecord,
    status: OutboxStatus,
    created_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl OutboxEntry {
    pub fn new(record: EventRecord) -> Self {
        Self {
            record,
            status: OutboxStatus::Pending,
            created_at: Utc::now(),
            published_at: None,
            last_error: None,
        }
    }

    pub fn record(&self) -> &EventRecord {
        &self.record
    }

    pub fn status(&self) -> OutboxStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 标记已发布；重复标记幂等，已发布状态不可回退。
    pub fn mark_published(&mut self) {
        if self.status == OutboxStatus::Published {
            return;
        }
        self.status = OutboxStatus::Published;
        self.published_at = Some(Utc::now());
        self.last_error = None;
    }

    /// 标记校验失败；已发布的条目不受影响。
    pub fn mark_failed(&mut self, reason: &str) {
        if self.status == OutboxStatus::Published {
            return;
        }
        self.status = OutboxStatus::Failed;
        self.last_error = Some(reason.to_string());
    }
}

/// Outbox 存储协议：与聚合仓储共享同一提交单元的实现（如内存互斥锁、
/// 数据库事务）负责 `stage` 的原子性；中继只依赖读取与标记。
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// 将一批条目与业务变更一并落库（同一提交单元内调用）
    async fn stage(&self, entries: Vec<OutboxEntry>) -> DomainResult<()>;

    /// 按创建顺序取出至多 `limit` 条待发布条目
    async fn fetch_pending(&self, limit: usize) -> DomainResult<Vec<OutboxEntry>>;

    /// 将事件标记为已发布（总线接受之后调用）
    async fn mark_published(&self, records: &[&EventRecord]) -> DomainResult<()>;

    /// 将事件标记为校验失败（不再参与重发）
    async fn mark_failed(&self, records: &[&EventRecord], reason: &str) -> DomainResult<()>;
}

#[async_trait]
impl<T> OutboxStore for std::sync::Arc<T>
where
    T: OutboxStore + ?Sized,
{
    async fn stage(&self, entries: Vec<OutboxEntry>) -> DomainResult<()> {
        (**self).stage(entries).await
    }

    async fn fetch_pending(&self, limit: usize) -> DomainResult<Vec<OutboxEntry>> {
        (**self).fetch_pending(limit).await
    }

    async fn mark_published(&self, records: &[&EventRecord]) -> DomainResult<()> {
        (**self).mark_published(records).await
    }

    async fn mark_failed(&self, records: &[&EventRecord], reason: &str) -> DomainResult<()> {
        (**self).mark_failed(records, reason).await
    }
}

/// 便捷校验：条目入库前校验其记录，返回首个校验错误。
pub fn validate_entries(entries: &[OutboxEntry]) -> DomainResult<()> {
    for entry in entries {
        entry.record().validate().map_err(|err| match err {
            DomainError::Validation { reason } => DomainError::Validation {
                reason: format!("event {}: {reason}", entry.record().event_id()),
            },
            other => other,
        })?;
    }
    Ok(())
}
