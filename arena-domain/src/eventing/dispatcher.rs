//! 分发器（Dispatcher）与聚合通道（Lane）
//!
//! 订阅循环把事件记录按聚合 ID 散列路由到固定数量的通道，
//! 每条通道由单个 worker 串行消费，保证同一聚合的事件按暂存顺序投递；
//! 不同聚合落在不同通道时并行处理。
//!
//! 单条记录的投递流程：
//! 1. 匹配订阅并按优先级串行执行；
//! 2. 账本幂等：已登记的 (event, handler) 直接视为成功；
//! 3. 瞬态失败按订阅的重试策略指数退避；
//! 4. 预算用尽或永久失败登记死信，绝不向相邻处理器或通道传播。
//!
use crate::{
    error::{DomainError, DomainResult},
    eventing::subscription::{IdempotencyMode, Subscription, SubscriptionSet},
    persist::{DeadLetter, DeadLetterStore, EventRecord, IdempotencyLedger},
};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// 通道内流转的作业
pub(crate) enum LaneJob {
    /// 常规投递：对所有匹配订阅执行
    Deliver(EventRecord),
    /// 死信重放：只对指定处理器执行，重试预算重新计算
    Replay {
        record: EventRecord,
        handler_id: String,
    },
}

impl LaneJob {
    fn record(&self) -> &EventRecord {
        match self {
            LaneJob::Deliver(record) => record,
            LaneJob::Replay { record, .. } => record,
        }
    }
}

/// 按聚合 ID 散列选择通道的路由器
#[derive(Clone)]
pub(crate) struct LaneRouter {
    senders: Vec<mpsc::Sender<LaneJob>>,
}

impl LaneRouter {
    pub(crate) fn new(senders: Vec<mpsc::Sender<LaneJob>>) -> Self {
        Self { senders }
    }

    fn lane_for(&self, aggregate_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        aggregate_id.hash(&mut hasher);
        (hasher.finish() % self.senders.len() as u64) as usize
    }

    /// 入队阻塞等待通道空位，对总线订阅形成背压
    pub(crate) async fn route(&self, job: LaneJob) -> DomainResult<()> {
        let lane = self.lane_for(job.record().aggregate_id());
        self.senders[lane]
            .send(job)
            .await
            .map_err(|_| DomainError::event_bus("lane worker stopped"))
    }
}

/// 单条通道的消费循环
pub(crate) async fn run_lane(
    dispatcher: Dispatcher,
    mut jobs: mpsc::Receiver<LaneJob>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            maybe_job = jobs.recv() => {
                match maybe_job {
                    Some(LaneJob::Deliver(record)) => dispatcher.dispatch(&record).await,
                    Some(LaneJob::Replay { record, handler_id }) => {
                        dispatcher.replay(&record, &handler_id).await
                    }
                    None => break,
                }
            }
        }
    }
}

/// 把一条事件记录投递给匹配订阅的执行器
#[derive(Clone)]
pub(crate) struct Dispatcher {
    subscriptions: SubscriptionSet,
    ledger: Arc<dyn IdempotencyLedger>,
    dead_letters: Arc<dyn DeadLetterStore>,
    handler_timeout: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        subscriptions: SubscriptionSet,
        ledger: Arc<dyn IdempotencyLedger>,
        dead_letters: Arc<dyn DeadLetterStore>,
        handler_timeout: Duration,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            dead_letters,
            handler_timeout,
        }
    }

    /// 对所有匹配订阅串行执行；单个订阅的失败在 `deliver` 内收敛
    pub(crate) async fn dispatch(&self, record: &EventRecord) {
        let matched = self.subscriptions.matching(record.event_type());
        if matched.is_empty() {
            debug!(event_type = record.event_type(), "no subscription matched");
            return;
        }

        for subscription in &matched {
            self.deliver(record, subscription).await;
        }
    }

    /// 死信重放：只针对指定处理器，预算重新起算
    pub(crate) async fn replay(&self, record: &EventRecord, handler_id: &str) {
        match self.subscriptions.find(handler_id) {
            Some(subscription) => self.deliver(record, &subscription).await,
            // 入队前已校验过处理器存在，这里只可能是注册表被并发替换
            None => error!(handler = handler_id, "replay target no longer subscribed"),
        }
    }

    /// 带重试的单订阅投递；任何最终失败都登记死信而非向上传播
    async fn deliver(&self, record: &EventRecord, subscription: &Subscription) {
        let policy = subscription.retry();
        let mut attempt: u32 = 1;

        loop {
            match self.attempt_once(record, subscription).await {
                Ok(()) => return,
                Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        event_id = record.event_id(),
                        handler = subscription.handler_id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "handler failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        event_id = record.event_id(),
                        handler = subscription.handler_id(),
                        attempts = attempt,
                        error = %err,
                        "delivery exhausted, dead-lettering"
                    );
                    let letter = DeadLetter::new(
                        record.clone(),
                        subscription.handler_id(),
                        attempt,
                        err.to_string(),
                    );
                    if let Err(push_err) = self.dead_letters.push(letter).await {
                        error!(error = %push_err, "dead letter store rejected entry");
                    }
                    return;
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        record: &EventRecord,
        subscription: &Subscription,
    ) -> DomainResult<()> {
        let ledgered = subscription.idempotency() == IdempotencyMode::Ledgered;

        if ledgered
            && self
                .ledger
                .has_processed(record.event_id(), subscription.handler_id())
                .await?
        {
            debug!(
                event_id = record.event_id(),
                handler = subscription.handler_id(),
                "already processed, redelivery absorbed"
            );
            return Ok(());
        }

        match tokio::time::timeout(self.handler_timeout, subscription.handler().handle(record))
            .await
        {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(DomainError::transient(format!(
                    "handler {} timed out after {:?}",
                    subscription.handler_id(),
                    self.handler_timeout,
                )));
            }
        }

        // AlreadyRecorded 说明并发投递已登记，同样视为成功
        if ledgered {
            self.ledger
                .record_processed(record.event_id(), subscription.handler_id())
                .await?;
        }
        Ok(())
    }
}
