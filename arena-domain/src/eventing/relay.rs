//! Outbox 中继（OutboxRelay）
//!
//! 周期性从 Outbox 取出待发布记录并推送到事件总线：
//! - 整批发布成功则整批标记 `Published`；
//! - 批量失败时退化为逐条发布，校验失败的记录标记 `Failed` 停靠，
//!   瞬态失败的记录保持 `Pending` 留待下个周期；
//! - 同一记录可能被发布多次（批量部分成功后重放），下游以幂等账本吸收。
//!
use crate::{
    error::{DomainError, DomainResult},
    eventing::EventBus,
    persist::{EventRecord, OutboxStore},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outbox -> EventBus 的中继
#[derive(Clone)]
pub struct OutboxRelay {
    bus: Arc<dyn EventBus>,
    outbox: Arc<dyn OutboxStore>,
    batch: usize,
}

impl OutboxRelay {
    pub fn new(bus: Arc<dyn EventBus>, outbox: Arc<dyn OutboxStore>, batch: usize) -> Self {
        Self { bus, outbox, batch }
    }

    /// 执行一轮中继，返回本轮成功发布的记录数
    pub async fn tick(&self) -> DomainResult<usize> {
        let entries = self.outbox.fetch_pending(self.batch).await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let records: Vec<EventRecord> =
            entries.iter().map(|entry| entry.record().clone()).collect();

        match self.bus.publish_batch(&records).await {
            Ok(()) => {
                let refs: Vec<&EventRecord> = records.iter().collect();
                self.outbox.mark_published(&refs).await?;
                debug!(count = records.len(), "outbox batch published");
                Ok(records.len())
            }
            Err(batch_err) => {
                warn!(error = %batch_err, "batch publish failed, retrying per record");
                let mut published = 0;
                for record in &records {
                    match self.bus.publish(record).await {
                        Ok(()) => {
                            self.outbox.mark_published(&[record]).await?;
                            published += 1;
                        }
                        Err(err @ DomainError::Validation { .. }) => {
                            // 畸形记录重投无意义，停靠并保留原因供人工处理
                            warn!(
                                event_id = record.event_id(),
                                error = %err,
                                "malformed record parked"
                            );
                            self.outbox.mark_failed(&[record], &err.to_string()).await?;
                        }
                        Err(err) => {
                            // 瞬态失败：保持 Pending，下个周期重投
                            warn!(
                                event_id = record.event_id(),
                                error = %err,
                                "publish failed, record stays pending"
                            );
                        }
                    }
                }
                Ok(published)
            }
        }
    }
}
