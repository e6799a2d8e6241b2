//! 内存版聚合存储（InMemoryAggregateStore）
//!
//! 聚合状态与 Outbox 共用一把互斥锁，使 `save` 具备与数据库事务等价的
//! 原子性：校验或序号检查失败时整体中止，不会留下半提交状态。
//! 同时实现 `OutboxStore`，供中继取数与标记。适用于测试与本地开发，
//! 语义与 SQL 实现对齐。
//!
use crate::{
    aggregate::Aggregate,
    domain_event::{EventContext, EventEnvelope},
    error::{DomainError, DomainResult},
    persist::{
        EventRecord, OutboxEntry, OutboxStatus, OutboxStore, serialize_events, validate_entries,
    },
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct StoreInner {
    /// (aggregate_type, aggregate_id) -> 聚合状态快照
    aggregates: HashMap<(String, String), Value>,
    /// (aggregate_type, aggregate_id) -> 已提交的最大事件序号
    sequences: HashMap<(String, String), u64>,
    /// 按创建顺序保存的 Outbox 条目
    outbox: Vec<OutboxEntry>,
}

/// 聚合状态 + Outbox 的内存组合存储
#[derive(Clone, Default)]
pub struct InMemoryAggregateStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, StoreInner> {
        // 锁中毒仅在持锁线程 panic 时发生；内存实现继续使用内部状态
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 当前全部 Outbox 条目的快照（测试断言用）
    pub fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.locked().outbox.clone()
    }
}

#[async_trait]
impl<A> crate::persist::AggregateRepository<A> for InMemoryAggregateStore
where
    A: Aggregate,
    A::Error: From<DomainError>,
{
    async fn load(&self, aggregate_id: &A::Id) -> Result<Option<A>, A::Error> {
        let key = (A::TYPE.to_string(), aggregate_id.to_string());
        let state = self.locked().aggregates.get(&key).cloned();

        match state {
            Some(value) => {
                let aggregate = serde_json::from_value::<A>(value)
                    .map_err(DomainError::from)
                    .map_err(A::Error::from)?;
                Ok(Some(aggregate))
            }
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        aggregate: &A,
        events: Vec<A::Event>,
        context: EventContext,
    ) -> Result<Vec<EventEnvelope<A>>, A::Error> {
        let envelopes: Vec<EventEnvelope<A>> = events
            .into_iter()
            .map(|event| EventEnvelope::new(aggregate.id(), event, context.clone()))
            .collect();

        if envelopes.is_empty() {
            return Ok(envelopes);
        }

        let records = serialize_events(&envelopes).map_err(A::Error::from)?;
        for record in &records {
            record.validate().map_err(A::Error::from)?;
        }

        let state = serde_json::to_value(aggregate)
            .map_err(DomainError::from)
            .map_err(A::Error::from)?;

        let key = (A::TYPE.to_string(), aggregate.id().to_string());
        let mut inner = self.locked();

        // 乐观并发控制：事件序号必须从已提交的最大序号逐一递增
        let mut expected = inner.sequences.get(&key).copied().unwrap_or(0) + 1;
        for record in &records {
            if record.sequence() != expected {
                return Err(A::Error::from(DomainError::SequenceConflict {
                    aggregate_id: key.1.clone(),
                    expected,
                    actual: record.sequence(),
                }));
            }
            expected += 1;
        }

        inner.aggregates.insert(key.clone(), state);
        inner.sequences.insert(key, expected - 1);
        inner
            .outbox
            .extend(records.into_iter().map(OutboxEntry::new));

        Ok(envelopes)
    }
}

#[async_trait]
impl OutboxStore for InMemoryAggregateStore {
    async fn stage(&self, entries: Vec<OutboxEntry>) -> DomainResult<()> {
        validate_entries(&entries)?;
        self.locked().outbox.extend(entries);
        Ok(())
    }

    async fn fetch_pending(&self, limit: usize) -> DomainResult<Vec<OutboxEntry>> {
        let inner = self.locked();
        Ok(inner
            .outbox
            .iter()
            .filter(|entry| entry.status() == OutboxStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, records: &[&EventRecord]) -> DomainResult<()> {
        let mut inner = self.locked();
        for record in records {
            for entry in inner
                .outbox
                .iter_mut()
                .filter(|entry| entry.record().event_id() == record.event_id())
            {
                entry.mark_published();
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, records: &[&EventRecord], reason: &str) -> DomainResult<()> {
        let mut inner = self.locked();
        for record in records {
            for entry in inner
                .outbox
                .iter_mut()
                .filter(|entry| entry.record().event_id() == record.event_id())
            {
                entry.mark_failed(reason);
            }
        }
        Ok(())
    }
}
