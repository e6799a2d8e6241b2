//! 事件总线（EventBus）协议
//!
//! 定义事件记录发布与订阅的统一抽象，支持批量发布与 'static 生命周期事件流，
//! 以便在异步运行时（如 tokio::spawn）中消费。总线只承诺“至少一次”投递，
//! 去重由下游的幂等账本完成。
//!
use crate::{error::DomainResult as Result, persist::EventRecord};
use async_trait::async_trait;
use futures_core::stream::BoxStream;

/// 事件总线：负责分发事件记录与订阅事件流
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, record: &EventRecord) -> Result<()>;

    async fn publish_batch(&self, records: &[EventRecord]) -> Result<()> {
        for record in records {
            self.publish(record).await?;
        }
        Ok(())
    }

    /// 返回一个 'static 生命周期的事件流，便于在 tokio::spawn 中使用
    async fn subscribe(&self) -> BoxStream<'static, Result<EventRecord>>;
}

#[async_trait]
impl<T> EventBus for std::sync::Arc<T>
where
    T: EventBus + ?Sized,
{
    async fn publish(&self, record: &EventRecord) -> Result<()> {
        (**self).publish(record).await
    }

    async fn publish_batch(&self, records: &[EventRecord]) -> Result<()> {
        (**self).publish_batch(records).await
    }

    async fn subscribe(&self) -> BoxStream<'static, Result<EventRecord>> {
        (**self).subscribe().await
    }
}
