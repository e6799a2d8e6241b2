//! 聚合仓储协议
//!
//! `save` 的约定是本 crate 可靠性语义的根基：聚合状态与本批事件的
//! Outbox 条目必须在同一提交单元内落库（内存实现为同一把锁，
//! 数据库实现为同一事务）。命令校验失败时整体中止，不产生任何条目。
//!
use crate::{
    aggregate::Aggregate,
    domain_event::{EventContext, EventEnvelope},
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AggregateRepository<A>: Send + Sync
where
    A: Aggregate,
{
    /// 加载聚合当前状态；不存在时返回 `None`
    async fn load(&self, aggregate_id: &A::Id) -> Result<Option<A>, A::Error>;

    /// 原子提交：聚合状态 + 事件对应的 Outbox 条目，返回已提交的事件信封
    async fn save(
        &self,
        aggregate: &A,
        events: Vec<A::Event>,
        context: EventContext,
    ) -> Result<Vec<EventEnvelope<A>>, A::Error>;
}

#[async_trait]
impl<A, T> AggregateRepository<A> for Arc<T>
where
    A: Aggregate,
    T: AggregateRepository<A> + ?Sized,
{
    async fn load(&self, aggregate_id: &A::Id) -> Result<Option<A>, A::Error> {
        (**self).load(aggregate_id).await
    }

    async fn save(
        &self,
        aggregate: &A,
        events: Vec<A::Event>,
        context: EventContext,
    ) -> Result<Vec<EventEnvelope<A>>, A::Error> {
        (**self).save(aggregate, events, context).await
    }
}
