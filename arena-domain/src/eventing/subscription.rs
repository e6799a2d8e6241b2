//! 订阅（Subscription）与订阅集（SubscriptionSet）
//!
//! 把处理器与其投递策略（优先级、重试、幂等方式）绑定为一条订阅，
//! 订阅集按事件类型建立索引，分发时合并精确匹配与全量订阅，
//! 并按优先级升序排列（同优先级保持注册顺序）。
//!
use crate::eventing::handler::{EventHandler, HandledEventType};
use bon::Builder;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// 重试策略：指数退避，封顶
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（首次投递计第 1 次）
    pub max_attempts: u32,
    /// 首次失败后的等待时长
    pub backoff_base: Duration,
    /// 退避上限
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff_base: Duration, backoff_cap: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base,
            backoff_cap,
        }
    }

    /// 第 `attempt` 次（从 1 计）失败后的等待时长：`base * 2^(attempt-1)`，以 `cap` 封顶
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << shift)
            .min(self.backoff_cap)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

/// 投递幂等方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdempotencyMode {
    /// 投递前查幂等账本、成功后登记凭证，重复投递被吸收
    #[default]
    Ledgered,
    /// 处理器自身幂等（如自带幂等键的外部调用），跳过账本
    Natural,
}

/// 一条订阅：处理器 + 投递策略
#[derive(Builder, Clone)]
pub struct Subscription {
    handler: Arc<dyn EventHandler>,
    /// 数值越小越先执行
    #[builder(default)]
    priority: u16,
    #[builder(default)]
    retry: RetryPolicy,
    #[builder(default)]
    idempotency: IdempotencyMode,
}

impl Subscription {
    pub fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }

    pub fn handler_id(&self) -> &str {
        self.handler.handler_id()
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn idempotency(&self) -> IdempotencyMode {
        self.idempotency
    }
}

/// 按事件类型索引的订阅集
#[derive(Clone, Default)]
pub struct SubscriptionSet {
    by_type: HashMap<String, Vec<Subscription>>,
    all: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        let mut by_type: HashMap<String, Vec<Subscription>> = HashMap::new();
        let mut all: Vec<Subscription> = Vec::new();

        for s in subscriptions {
            match s.handler.handled_event_type() {
                HandledEventType::All => all.push(s),
                HandledEventType::One(t) => {
                    by_type.entry(t).or_default().push(s);
                }
                HandledEventType::Many(ts) => {
                    for t in ts {
                        by_type.entry(t).or_default().push(s.clone());
                    }
                }
            }
        }

        Self { by_type, all }
    }

    /// 匹配该事件类型的订阅，按优先级升序（稳定排序，保留注册顺序）
    pub fn matching(&self, event_type: &str) -> Vec<Subscription> {
        let mut merged: Vec<Subscription> = Vec::new();
        if let Some(list) = self.by_type.get(event_type) {
            merged.extend(list.iter().cloned());
        }
        merged.extend(self.all.iter().cloned());
        merged.sort_by_key(|s| s.priority());
        merged
    }

    /// 按处理器标识查找订阅（用于重放）
    pub fn find(&self, handler_id: &str) -> Option<Subscription> {
        self.by_type
            .values()
            .flatten()
            .chain(self.all.iter())
            .find(|s| s.handler_id() == handler_id)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.all.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainResult;
    use crate::persist::EventRecord;
    use async_trait::async_trait;

    struct Noop {
        id: &'static str,
        types: HandledEventType,
    }

    #[async_trait]
    impl EventHandler for Noop {
        fn handler_id(&self) -> &str {
            self.id
        }
        fn handled_event_type(&self) -> HandledEventType {
            self.types.clone()
        }
        async fn handle(&self, _record: &EventRecord) -> DomainResult<()> {
            Ok(())
        }
    }

    fn sub(id: &'static str, types: HandledEventType, priority: u16) -> Subscription {
        Subscription::builder()
            .handler(Arc::new(Noop { id, types }) as Arc<dyn EventHandler>)
            .priority(priority)
            .build()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        // 封顶后不再增长
        assert_eq!(policy.delay_for(4), Duration::from_secs(4));
        assert_eq!(policy.delay_for(63), Duration::from_secs(4));
    }

    #[test]
    fn matching_merges_and_sorts_by_priority() {
        let set = SubscriptionSet::new(vec![
            sub("late", HandledEventType::One("a.b".into()), 20),
            sub("early", HandledEventType::One("a.b".into()), 0),
            sub("audit", HandledEventType::All, 10),
            sub("other", HandledEventType::One("x.y".into()), 0),
        ]);

        let matched = set.matching("a.b");
        let ids: Vec<&str> = matched.iter().map(|s| s.handler_id()).collect();
        assert_eq!(ids, vec!["early", "audit", "late"]);
    }

    #[test]
    fn find_locates_handler_across_buckets() {
        let set = SubscriptionSet::new(vec![
            sub(
                "multi",
                HandledEventType::Many(vec!["a.b".into(), "c.d".into()]),
                0,
            ),
            sub("audit", HandledEventType::All, 0),
        ]);

        assert!(set.find("multi").is_some());
        assert!(set.find("audit").is_some());
        assert!(set.find("missing").is_none());
        assert!(!set.is_empty());
    }
}
