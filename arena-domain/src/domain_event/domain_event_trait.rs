use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// 领域事件载荷需要满足的通用能力边界
pub trait DomainEvent:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync
{
    /// 事件唯一标识
    fn event_id(&self) -> &str;

    /// 事件类型（形如 `registration.created` 或自定义类型名）
    fn event_type(&self) -> &str;

    /// 事件载荷版本（用于版本兼容与上抬）
    fn event_version(&self) -> usize;

    /// 事件在所属聚合中的因果序号（单调递增，用于排序与并发控制）
    fn sequence(&self) -> u64;
}
