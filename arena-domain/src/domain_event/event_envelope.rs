use crate::aggregate::Aggregate;
use chrono::Utc;

use super::event_context::EventContext;
use super::metadata::Metadata;

/// 事件信封：事件在进程内的类型化形态，对应线上的 `EventRecord`。
///
/// 聚合执行命令产生的每个事件都先装入信封，携带归属元数据与
/// 调用上下文（关联/因果/操作者），随后在暂存入 Outbox 时转换为
/// `EventRecord`。两种形态可无损互转。
#[derive(Debug, Clone)]
pub struct EventEnvelope<A>
where
    A: Aggregate,
{
    /// 归属元数据：所属聚合与发生时间
    pub metadata: Metadata,
    /// 类型化事件载荷
    pub payload: A::Event,
    /// 调用上下文，跨事件链路传播
    pub context: EventContext,
}

impl<A> EventEnvelope<A>
where
    A: Aggregate,
{
    /// 以当前时刻封装事件；`occurred_at` 在此一次性确定。
    pub fn new(aggregate_id: &A::Id, payload: A::Event, context: EventContext) -> Self {
        let metadata = Metadata::builder()
            .aggregate_id(aggregate_id.to_string())
            .aggregate_type(A::TYPE.to_string())
            .occurred_at(Utc::now())
            .build();

        Self {
            metadata,
            payload,
            context,
        }
    }
}
