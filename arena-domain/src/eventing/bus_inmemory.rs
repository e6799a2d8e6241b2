//! 内存版事件总线（InMemoryEventBus）
//!
//! 基于 `tokio::sync::broadcast` 实现的轻量事件总线，满足 `EventBus` 协议：
//! - `publish`：先校验记录，再克隆广播；
//! - `subscribe`：返回 `'static` 生命周期事件流，便于在 `tokio::spawn` 中使用；
//! - 典型用途：测试环境、示例与本地开发。
//!
//! 注意：广播缓冲溢出时滞后的订阅者会收到 `Lagged` 错误，流中以
//! `DomainError::EventBus` 呈现；订阅循环应跳过并继续消费。

use crate::error::{DomainError, DomainResult as Result};
use crate::eventing::EventBus;
use crate::persist::EventRecord;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// 简单的内存事件总线实现
#[derive(Clone)]
pub struct InMemoryEventBus {
    tx: broadcast::Sender<EventRecord>,
}

impl InMemoryEventBus {
    /// 创建一个内存总线，`capacity` 为广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, record: &EventRecord) -> Result<()> {
        // 畸形记录在进入总线前拦截，发布方据此停靠该条目
        record.validate()?;
        // 若当前无订阅者，broadcast 的 send 会返回错误，这里视为非致命并忽略
        let _ = self.tx.send(record.clone());
        Ok(())
    }

    async fn subscribe(&self) -> BoxStream<'static, Result<EventRecord>> {
        let rx = self.tx.subscribe();
        let stream =
            BroadcastStream::new(rx).map(|r| r.map_err(|e| DomainError::event_bus(e.to_string())));
        Box::pin(stream)
    }
}
