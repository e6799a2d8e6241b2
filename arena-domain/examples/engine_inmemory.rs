/// 事件引擎（内存版）示例
/// 展示 聚合命令 -> Outbox -> Bus -> 订阅分发 的闭环，以及
/// 瞬态失败的指数退避重试、死信登记与运维重放
use anyhow::Result as AnyResult;
use arena_domain::aggregate::Aggregate;
use arena_domain::aggregate_root::AggregateRoot;
use arena_domain::domain_event::{DomainEvent, EventContext};
use arena_domain::entity::Entity;
use arena_domain::error::{DomainError, DomainResult};
use arena_domain::eventing::{
    EventEngine, EventEngineConfig, EventHandler, HandledEventType, InMemoryEventBus, RetryPolicy,
    Subscription,
};
use arena_domain::persist::{EventRecord, InMemoryAggregateStore, InMemoryDeadLetterStore,
    InMemoryIdempotencyLedger};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::{sync::Arc, time::Duration};

// ============================================================================
// 示例聚合（Match）
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Match {
    id: String,
    version: u64,
    points: u32,
}

impl Entity for Match {
    type Id = String;
    fn new(aggregate_id: Self::Id) -> Self {
        Self {
            id: aggregate_id,
            ..Default::default()
        }
    }
    fn id(&self) -> &Self::Id {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug)]
enum MatchCommand {
    RecordScore { points: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum MatchEvent {
    ScoreRecorded {
        id: String,
        sequence: u64,
        points: u32,
    },
}

impl DomainEvent for MatchEvent {
    fn event_id(&self) -> &str {
        match self {
            MatchEvent::ScoreRecorded { id, .. } => id,
        }
    }
    fn event_type(&self) -> &str {
        "match.score_recorded"
    }
    fn event_version(&self) -> usize {
        1
    }
    fn sequence(&self) -> u64 {
        match self {
            MatchEvent::ScoreRecorded { sequence, .. } => *sequence,
        }
    }
}

impl Aggregate for Match {
    const TYPE: &'static str = "match";
    type Command = MatchCommand;
    type Event = MatchEvent;
    type Error = DomainError;

    fn execute(&self, command: Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MatchCommand::RecordScore { points } => {
                if points == 0 {
                    return Err(DomainError::validation("points must be > 0"));
                }
                Ok(vec![MatchEvent::ScoreRecorded {
                    id: ulid::Ulid::new().to_string(),
                    sequence: self.version() + 1,
                    points,
                }])
            }
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MatchEvent::ScoreRecorded {
                sequence, points, ..
            } => {
                self.points += points;
                self.version = *sequence;
            }
        }
    }
}

// ============================================================================
// 示例处理器（EventHandler）
// ============================================================================

struct PrintHandler;

#[async_trait::async_trait]
impl EventHandler for PrintHandler {
    fn handler_id(&self) -> &str {
        "printer"
    }
    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::All
    }
    async fn handle(&self, record: &EventRecord) -> DomainResult<()> {
        println!(
            "handler=printer type={} aggregate={} seq={} payload={}",
            record.event_type(),
            record.aggregate_id(),
            record.sequence(),
            record.payload()
        );
        Ok(())
    }
}

/// 前两次调用瞬态失败，之后成功：演示指数退避重试
struct FlakyNotifier {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl EventHandler for FlakyNotifier {
    fn handler_id(&self) -> &str {
        "flaky-notifier"
    }
    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One("match.score_recorded".to_string())
    }
    async fn handle(&self, record: &EventRecord) -> DomainResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= 2 {
            println!("handler=flaky-notifier attempt={call} -> transient failure");
            return Err(DomainError::transient("notification gateway unreachable"));
        }
        println!(
            "handler=flaky-notifier attempt={call} -> delivered for {}",
            record.aggregate_id()
        );
        Ok(())
    }
}

/// 故障期间持续失败：演示死信登记与修复后的重放
struct OutagedHandler {
    healed: AtomicBool,
}

#[async_trait::async_trait]
impl EventHandler for OutagedHandler {
    fn handler_id(&self) -> &str {
        "outaged"
    }
    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One("match.score_recorded".to_string())
    }
    async fn handle(&self, record: &EventRecord) -> DomainResult<()> {
        if !self.healed.load(Ordering::SeqCst) {
            return Err(DomainError::transient("downstream outage"));
        }
        println!("handler=outaged replay served event {}", record.event_id());
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AnyResult<()> {
    println!("=== 事件引擎（内存版）示例 ===\n");

    // 聚合存储兼 Outbox：同一把锁保证状态与事件同批提交
    let store = Arc::new(InMemoryAggregateStore::new());
    let root = AggregateRoot::<Match, _>::new(store.clone());
    let context = EventContext::builder()
        .maybe_actor_type(Some("user".to_string()))
        .maybe_actor_id(Some("u-1".to_string()))
        .build();

    let m1 = "m-1".to_string();
    root.execute(
        &m1,
        MatchCommand::RecordScore { points: 3 },
        context.clone(),
    )
    .await?;
    println!("✅ 命令已提交，事件暂存于 Outbox");

    // 引擎装配
    let flaky = Arc::new(FlakyNotifier {
        calls: AtomicUsize::new(0),
    });
    let outaged = Arc::new(OutagedHandler {
        healed: AtomicBool::new(false),
    });
    let dead_letters = Arc::new(InMemoryDeadLetterStore::new());

    let engine = Arc::new(
        EventEngine::builder()
            .event_bus(Arc::new(InMemoryEventBus::new(1024)))
            .outbox(store.clone())
            .ledger(Arc::new(InMemoryIdempotencyLedger::new()))
            .dead_letters(dead_letters.clone())
            .subscriptions(vec![
                Subscription::builder()
                    .handler(Arc::new(PrintHandler) as Arc<dyn EventHandler>)
                    .priority(0)
                    .build(),
                Subscription::builder()
                    .handler(flaky.clone() as Arc<dyn EventHandler>)
                    .priority(1)
                    .retry(RetryPolicy::new(
                        3,
                        Duration::from_millis(50),
                        Duration::from_millis(200),
                    ))
                    .build(),
                Subscription::builder()
                    .handler(outaged.clone() as Arc<dyn EventHandler>)
                    .priority(2)
                    .retry(RetryPolicy::new(
                        2,
                        Duration::from_millis(20),
                        Duration::from_millis(40),
                    ))
                    .build(),
            ])
            .config(EventEngineConfig {
                relay_interval: Duration::from_millis(100),
                ..Default::default()
            })
            .build(),
    );

    let handle = engine.start().await;
    println!("✅ 引擎已启动");

    // 演示在运行中继续提交命令
    tokio::time::sleep(Duration::from_millis(200)).await;
    let m2 = "m-2".to_string();
    root.execute(
        &m2,
        MatchCommand::RecordScore { points: 7 },
        context.clone(),
    )
    .await?;
    println!("✅ 追加命令: m-2 记分 7");

    tokio::time::sleep(Duration::from_secs(1)).await;

    // 故障处理器重试耗尽后进入死信
    let letters = dead_letters.list().await?;
    println!("\n当前死信数: {}", letters.len());
    for letter in &letters {
        println!(
            "  event={} handler={} attempts={} error={}",
            letter.record().event_id(),
            letter.handler_id(),
            letter.attempts(),
            letter.last_error()
        );
    }

    // 修复故障后逐条重放
    outaged.healed.store(true, Ordering::SeqCst);
    for letter in &letters {
        handle
            .replay(letter.record().event_id(), letter.handler_id())
            .await?;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("✅ 重放完成，剩余死信数: {}", dead_letters.list().await?.len());

    handle.shutdown();
    handle.join().await;
    println!("\n✅ 优雅关闭完成");
    Ok(())
}
