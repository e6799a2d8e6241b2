//! 事件处理器（EventHandler）
//!
//! 定义消费某类/多类/全部事件的处理逻辑与元信息（标识、订阅类型）。
//! `handler_id` 参与幂等账本与死信的键，注册后不可变更，否则历史
//! 凭证失效、已吸收的重复投递会再次生效。
//!
use crate::{error::DomainResult, persist::EventRecord};
use async_trait::async_trait;

#[derive(Clone, Debug)]
pub enum HandledEventType {
    One(String),
    Many(Vec<String>),
    All,
}

/// 事件处理器：处理某一类型的事件
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器稳定标识（幂等账本与死信的键）
    fn handler_id(&self) -> &str;
    /// 返回该处理器支持的事件类型
    fn handled_event_type(&self) -> HandledEventType;
    /// 处理事件；瞬态失败返回 `is_transient` 为真的错误以触发重试
    async fn handle(&self, record: &EventRecord) -> DomainResult<()>;
}
