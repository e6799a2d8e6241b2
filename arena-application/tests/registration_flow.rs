use arena_application::handlers::{AwardCoinsHandler, SEND_NOTIFICATION, SendNotificationHandler};
use arena_application::provider::{
    GAME_RULES, GameRules, InMemoryNotificationSender, InMemoryRewardLedger,
    InMemoryTournamentDirectory, NOTIFICATION_SENDER, NotificationSender, ProviderError,
    REWARD_LEDGER, RewardLedger, SendTicket, StandardRules, TOURNAMENT_DIRECTORY,
    TournamentDirectory, TournamentState, TournamentView,
};
use arena_application::registration::{
    EVENT_PAYMENT_VERIFIED, EVENT_REGISTRATION_CREATED, RegistrationService, RegistrationState,
};
use arena_application::{AppContext, CapabilityRegistry, SelectionRule};
use arena_domain::eventing::{
    EventEngine, EventEngineConfig, EventHandler, InMemoryEventBus, RetryPolicy, Subscription,
};
use arena_domain::persist::{
    DeadLetterStore, InMemoryAggregateStore, InMemoryDeadLetterStore, InMemoryIdempotencyLedger,
    OutboxEntry, OutboxStatus, OutboxStore,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

struct FlakyGateway {
    fail_first: u32,
    calls: AtomicU32,
}

impl FlakyGateway {
    fn new(fail_first: u32) -> Self {
        Self {
            fail_first,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl NotificationSender for FlakyGateway {
    async fn send(
        &self,
        _template: &str,
        _recipient: &str,
        _payload: &Value,
    ) -> Result<SendTicket, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(ProviderError::Unavailable("gateway down".into()));
        }
        Ok(SendTicket {
            ticket_id: format!("ticket-{call}"),
        })
    }
}

struct OutagedGateway {
    healed: AtomicBool,
    calls: AtomicU32,
    delivered: AtomicU32,
}

impl OutagedGateway {
    fn new() -> Self {
        Self {
            healed: AtomicBool::new(false),
            calls: AtomicU32::new(0),
            delivered: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl NotificationSender for OutagedGateway {
    async fn send(
        &self,
        _template: &str,
        _recipient: &str,
        _payload: &Value,
    ) -> Result<SendTicket, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.healed.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("gateway down".into()));
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(SendTicket {
            ticket_id: format!("ticket-{call}"),
        })
    }
}

fn open_tournament_directory() -> InMemoryTournamentDirectory {
    let directory = InMemoryTournamentDirectory::new();
    directory.upsert(TournamentView {
        tournament_id: "t-1".into(),
        game: "chess".into(),
        state: TournamentState::Open,
        entry_fee: 10,
    });
    directory
}

fn wire_registry(
    rules: Vec<(&str, i64, SelectionRule)>,
    rewards: Arc<InMemoryRewardLedger>,
    sender: Arc<dyn NotificationSender>,
) -> Arc<CapabilityRegistry> {
    let mut builder = CapabilityRegistry::builder()
        .register::<dyn TournamentDirectory>(
            TOURNAMENT_DIRECTORY,
            "v1",
            Arc::new(open_tournament_directory()),
            SelectionRule::Default,
        )
        .register::<dyn RewardLedger>(REWARD_LEDGER, "v1", rewards, SelectionRule::Default)
        .register::<dyn NotificationSender>(
            NOTIFICATION_SENDER,
            "v1",
            sender,
            SelectionRule::Default,
        );
    for (version, bonus, rule) in rules {
        builder = builder.register::<dyn GameRules>(
            GAME_RULES,
            version,
            Arc::new(StandardRules::new(bonus)),
            rule,
        );
    }
    Arc::new(builder.build().unwrap())
}

fn fast_config() -> EventEngineConfig {
    EventEngineConfig {
        relay_interval: Duration::from_millis(20),
        lanes: 4,
        ..Default::default()
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(5), Duration::from_millis(20))
}

#[tokio::test(flavor = "multi_thread")]
async fn verified_payment_awards_bonus_exactly_once_despite_redelivery() {
    let bus = Arc::new(InMemoryEventBus::new(256));
    let store = InMemoryAggregateStore::new();
    let ledger = Arc::new(InMemoryIdempotencyLedger::new());
    let dead_letters = Arc::new(InMemoryDeadLetterStore::new());
    let rewards = Arc::new(InMemoryRewardLedger::new());
    let sender = Arc::new(InMemoryNotificationSender::new());

    let registry = wire_registry(
        vec![("v1", 25, SelectionRule::Default)],
        rewards.clone(),
        sender.clone(),
    );
    let service = RegistrationService::new(store.clone(), registry.clone());
    let ctx = AppContext::for_aggregate("r-1");

    service.open("r-1", "t-1", "p-1", &ctx).await.unwrap();
    service.verify_payment("r-1", "pay-1", &ctx).await.unwrap();

    // 把 payment_verified 记录再暂存两次，模拟至少一次投递下的重复
    let verified_record = store
        .outbox_entries()
        .iter()
        .find(|e| e.record().event_type() == EVENT_PAYMENT_VERIFIED)
        .map(|e| e.record().clone())
        .unwrap();
    store
        .stage(vec![
            OutboxEntry::new(verified_record.clone()),
            OutboxEntry::new(verified_record.clone()),
        ])
        .await
        .unwrap();

    let engine = Arc::new(
        EventEngine::builder()
            .event_bus(bus)
            .outbox(Arc::new(store.clone()))
            .ledger(ledger.clone())
            .dead_letters(dead_letters.clone())
            .subscriptions(vec![
                Subscription::builder()
                    .handler(Arc::new(AwardCoinsHandler::new(registry.clone()))
                        as Arc<dyn EventHandler>)
                    .build(),
                Subscription::builder()
                    .handler(Arc::new(SendNotificationHandler::new(registry.clone()))
                        as Arc<dyn EventHandler>)
                    .build(),
            ])
            .config(fast_config())
            .build(),
    );
    let handle = engine.start().await;

    let _ = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let relayed = store
                .outbox_entries()
                .iter()
                .all(|e| e.status() == OutboxStatus::Published);
            if relayed && ledger.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    // 留出窗口让潜在的重复生效暴露出来
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.shutdown();
    handle.join().await;

    assert_eq!(rewards.balance("p-1"), 25);
    assert_eq!(sender.sent().len(), 1);
    assert_eq!(ledger.len(), 2);
    assert!(dead_letters.list().await.unwrap().is_empty());

    let registration = service.load("r-1").await.unwrap().unwrap();
    assert_eq!(registration.state(), RegistrationState::Verified);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_rollout_routes_every_aggregate_to_candidate_rules() {
    let rewards = Arc::new(InMemoryRewardLedger::new());
    let sender = Arc::new(InMemoryNotificationSender::new());
    let registry = wire_registry(
        vec![
            ("v1", 25, SelectionRule::Default),
            ("v2", 50, SelectionRule::Rollout { percent: 100 }),
        ],
        rewards,
        sender,
    );

    for n in 0..40 {
        let ctx = AppContext::for_aggregate(format!("r-{n}"));
        let rules = registry.resolve::<dyn GameRules>(GAME_RULES, &ctx).unwrap();
        assert_eq!(rules.verification_bonus("chess").await.unwrap(), 50);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_rollout_never_routes_to_candidate_rules() {
    let rewards = Arc::new(InMemoryRewardLedger::new());
    let sender = Arc::new(InMemoryNotificationSender::new());
    let registry = wire_registry(
        vec![
            ("v1", 25, SelectionRule::Default),
            ("v2", 50, SelectionRule::Rollout { percent: 0 }),
        ],
        rewards,
        sender,
    );

    for n in 0..40 {
        let ctx = AppContext::for_aggregate(format!("r-{n}"));
        let rules = registry.resolve::<dyn GameRules>(GAME_RULES, &ctx).unwrap();
        assert_eq!(rules.verification_bonus("chess").await.unwrap(), 25);
    }

    // 钉选仍可显式选中灰度版本
    let pinned = AppContext::for_aggregate("r-0").with_override(GAME_RULES, "v2");
    let rules = registry
        .resolve::<dyn GameRules>(GAME_RULES, &pinned)
        .unwrap();
    assert_eq!(rules.verification_bonus("chess").await.unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread")]
async fn notification_outage_retries_then_succeeds() {
    let bus = Arc::new(InMemoryEventBus::new(256));
    let store = InMemoryAggregateStore::new();
    let ledger = Arc::new(InMemoryIdempotencyLedger::new());
    let dead_letters = Arc::new(InMemoryDeadLetterStore::new());
    let rewards = Arc::new(InMemoryRewardLedger::new());
    let gateway = Arc::new(FlakyGateway::new(2));

    let registry = wire_registry(
        vec![("v1", 25, SelectionRule::Default)],
        rewards,
        gateway.clone(),
    );
    let service = RegistrationService::new(store.clone(), registry.clone());
    let ctx = AppContext::for_aggregate("r-1");
    service.open("r-1", "t-1", "p-1", &ctx).await.unwrap();

    let engine = Arc::new(
        EventEngine::builder()
            .event_bus(bus)
            .outbox(Arc::new(store.clone()))
            .ledger(ledger.clone())
            .dead_letters(dead_letters.clone())
            .subscriptions(vec![
                Subscription::builder()
                    .handler(Arc::new(SendNotificationHandler::new(registry.clone()))
                        as Arc<dyn EventHandler>)
                    .retry(fast_retry(3))
                    .build(),
            ])
            .config(fast_config())
            .build(),
    );
    let handle = engine.start().await;

    let _ = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if ledger.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    handle.shutdown();
    handle.join().await;

    // 两次失败 + 一次成功，刚好落在重试预算内
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    assert_eq!(ledger.len(), 1);
    assert!(dead_letters.list().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_notification_dead_letters_without_blocking_siblings() {
    let bus = Arc::new(InMemoryEventBus::new(256));
    let store = InMemoryAggregateStore::new();
    let ledger = Arc::new(InMemoryIdempotencyLedger::new());
    let dead_letters = Arc::new(InMemoryDeadLetterStore::new());
    let rewards = Arc::new(InMemoryRewardLedger::new());
    let gateway = Arc::new(OutagedGateway::new());

    let registry = wire_registry(
        vec![("v1", 25, SelectionRule::Default)],
        rewards.clone(),
        gateway.clone(),
    );
    let service = RegistrationService::new(store.clone(), registry.clone());
    let ctx = AppContext::for_aggregate("r-1");
    service.open("r-1", "t-1", "p-1", &ctx).await.unwrap();
    service.verify_payment("r-1", "pay-1", &ctx).await.unwrap();

    let created_event_id = store
        .outbox_entries()
        .iter()
        .find(|e| e.record().event_type() == EVENT_REGISTRATION_CREATED)
        .map(|e| e.record().event_id().to_string())
        .unwrap();

    let engine = Arc::new(
        EventEngine::builder()
            .event_bus(bus)
            .outbox(Arc::new(store.clone()))
            .ledger(ledger.clone())
            .dead_letters(dead_letters.clone())
            .subscriptions(vec![
                Subscription::builder()
                    .handler(Arc::new(SendNotificationHandler::new(registry.clone()))
                        as Arc<dyn EventHandler>)
                    .retry(fast_retry(2))
                    .build(),
                Subscription::builder()
                    .handler(Arc::new(AwardCoinsHandler::new(registry.clone()))
                        as Arc<dyn EventHandler>)
                    .build(),
            ])
            .config(fast_config())
            .build(),
    );
    let handle = engine.start().await;

    let _ = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let dead = dead_letters.list().await.unwrap();
            if !dead.is_empty() && rewards.balance("p-1") == 25 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    // 通知耗尽重试进入死信；同事件的兄弟处理器不受影响
    let dead = dead_letters.list().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].handler_id(), SEND_NOTIFICATION);
    assert_eq!(dead[0].attempts(), 2);
    assert_eq!(dead[0].record().event_id(), created_event_id);
    assert_eq!(rewards.balance("p-1"), 25);

    // 网关恢复后回放死信，欢迎通知补发成功
    gateway.healed.store(true, Ordering::SeqCst);
    handle
        .replay(&created_event_id, SEND_NOTIFICATION)
        .await
        .unwrap();

    let _ = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if gateway.delivered.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    handle.shutdown();
    handle.join().await;

    assert_eq!(gateway.delivered.load(Ordering::SeqCst), 1);
    assert!(dead_letters.list().await.unwrap().is_empty());
}
