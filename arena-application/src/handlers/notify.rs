//! 欢迎通知处理器（SendNotificationHandler）
//!
//! 订阅 `registration.created`：通过通知提供方向玩家发送欢迎消息。
//! 网关不可达（`Unavailable`）转换为瞬时错误，由调度器按订阅的
//! 重试策略退避重试；重试耗尽后进入死信，等待运维修复后回放。
//!
use crate::context::AppContext;
use crate::provider::{NOTIFICATION_SENDER, NotificationSender};
use crate::registration::{EVENT_REGISTRATION_CREATED, RegistrationEvent};
use crate::registry::CapabilityRegistry;
use arena_domain::error::{DomainError, DomainResult};
use arena_domain::eventing::{EventHandler, HandledEventType};
use arena_domain::persist::EventRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// 处理器稳定标识（幂等账本与死信的键）
pub const SEND_NOTIFICATION: &str = "send-notification";

const WELCOME_TEMPLATE: &str = "registration.welcome";

pub struct SendNotificationHandler {
    registry: Arc<CapabilityRegistry>,
}

impl SendNotificationHandler {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventHandler for SendNotificationHandler {
    fn handler_id(&self) -> &str {
        SEND_NOTIFICATION
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One(EVENT_REGISTRATION_CREATED.to_string())
    }

    async fn handle(&self, record: &EventRecord) -> DomainResult<()> {
        let event: RegistrationEvent = serde_json::from_value(record.payload().clone())?;
        let RegistrationEvent::Created { player_id, .. } = event else {
            return Err(DomainError::permanent(format!(
                "handler {SEND_NOTIFICATION} received unexpected event {}",
                record.event_type()
            )));
        };

        let ctx = AppContext::for_aggregate(record.aggregate_id());
        let sender = self
            .registry
            .resolve::<dyn NotificationSender>(NOTIFICATION_SENDER, &ctx)?;
        let ticket = sender
            .send(WELCOME_TEMPLATE, &player_id, record.payload())
            .await?;

        tracing::debug!(
            player_id = %player_id,
            ticket_id = %ticket.ticket_id,
            "welcome notification sent"
        );
        Ok(())
    }
}
