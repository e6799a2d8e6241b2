//! 死信（Dead Letter）
//!
//! 某条 (event, handler) 的投递在重试预算耗尽或遇到永久性错误后进入死信，
//! 连同完整事件快照与失败原因一并保留，等待运维侧排查与重放。
//! 进入死信不影响同一事件的其他处理器，也不会中断调度循环。
//!
use crate::error::DomainResult;
use crate::persist::EventRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// 死信条目：事件快照 + 处理器 + 失败轨迹
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    record: EventRecord,
    handler_id: String,
    attempts: u32,
    last_error: String,
    dead_lettered_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        record: EventRecord,
        handler_id: impl Into<String>,
        attempts: u32,
        last_error: impl Into<String>,
    ) -> Self {
        Self {
            record,
            handler_id: handler_id.into(),
            attempts,
            last_error: last_error.into(),
            dead_lettered_at: Utc::now(),
        }
    }

    pub fn record(&self) -> &EventRecord {
        &self.record
    }

    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn dead_lettered_at(&self) -> DateTime<Utc> {
        self.dead_lettered_at
    }
}

/// 死信存储协议：按 (event_id, handler_id) 唯一定位一条死信
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// 写入死信；同一 (event, handler) 重复写入以最新一条为准
    async fn push(&self, letter: DeadLetter) -> DomainResult<()>;

    /// 列出当前全部死信（运维巡检）
    async fn list(&self) -> DomainResult<Vec<DeadLetter>>;

    /// 取出并移除指定死信（重放前调用，避免重复重放）
    async fn take(&self, event_id: &str, handler_id: &str) -> DomainResult<Option<DeadLetter>>;
}

#[async_trait]
impl<T> DeadLetterStore for std::sync::Arc<T>
where
    T: DeadLetterStore + ?Sized,
{
    async fn push(&self, letter: DeadLetter) -> DomainResult<()> {
        (**self).push(letter).await
    }

    async fn list(&self) -> DomainResult<Vec<DeadLetter>> {
        (**self).list().await
    }

    async fn take(&self, event_id: &str, handler_id: &str) -> DomainResult<Option<DeadLetter>> {
        (**self).take(event_id, handler_id).await
    }
}

/// 内存版死信存储，适用于测试与本地开发
#[derive(Default)]
pub struct InMemoryDeadLetterStore {
    letters: DashMap<(String, String), DeadLetter>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn push(&self, letter: DeadLetter) -> DomainResult<()> {
        let key = (
            letter.record().event_id().to_string(),
            letter.handler_id().to_string(),
        );
        self.letters.insert(key, letter);
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<DeadLetter>> {
        let mut letters: Vec<DeadLetter> =
            self.letters.iter().map(|kv| kv.value().clone()).collect();
        letters.sort_by_key(|l| l.dead_lettered_at());
        Ok(letters)
    }

    async fn take(&self, event_id: &str, handler_id: &str) -> DomainResult<Option<DeadLetter>> {
        let key = (event_id.to_string(), handler_id.to_string());
        Ok(self.letters.remove(&key).map(|(_, letter)| letter))
    }
}
