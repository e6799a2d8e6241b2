//! 通知发送（NotificationSender）
use super::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// 注册表中的能力名
pub const NOTIFICATION_SENDER: &str = "notification.sender";

/// 发送回执
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTicket {
    pub ticket_id: String,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 发送模板通知；网关不可达返回 `Unavailable`（瞬态，可重试）
    async fn send(
        &self,
        template: &str,
        recipient: &str,
        payload: &serde_json::Value,
    ) -> Result<SendTicket, ProviderError>;
}

/// 记录全部发送请求的内存实现
#[derive(Default)]
pub struct InMemoryNotificationSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl InMemoryNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// (template, recipient) 列表快照
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationSender for InMemoryNotificationSender {
    async fn send(
        &self,
        template: &str,
        recipient: &str,
        _payload: &serde_json::Value,
    ) -> Result<SendTicket, ProviderError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((template.to_string(), recipient.to_string()));
        Ok(SendTicket {
            ticket_id: Uuid::new_v4().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_records_request_and_returns_ticket() {
        let sender = InMemoryNotificationSender::new();
        let ticket = sender
            .send("registration.welcome", "p-1", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(!ticket.ticket_id.is_empty());
        assert_eq!(
            sender.sent(),
            vec![("registration.welcome".to_string(), "p-1".to_string())]
        );
    }
}
