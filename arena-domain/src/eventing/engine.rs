//! 事件引擎（EventEngine）
//!
//! 统一编排“中继 → 订阅 → 分发处理”的长驻任务：
//! - 周期性驱动 Outbox 中继，把待发布记录推上总线；
//! - 订阅总线事件流，按聚合 ID 散列路由到串行通道；
//! - 通道内按订阅优先级分发，重试、幂等与死信由分发器收敛；
//! - 提供关闭、等待与死信重放的 `EngineHandle`。
//!
use super::dispatcher::{Dispatcher, LaneJob, LaneRouter, run_lane};
use super::relay::OutboxRelay;
use super::subscription::{Subscription, SubscriptionSet};
use super::EventBus;
use crate::error::{DomainError, DomainResult};
use crate::persist::{DeadLetterStore, EventRecord, IdempotencyLedger, OutboxStore};
use bon::Builder;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::event_engine_builder::{IsUnset, SetRegistry, State as BuilderState};

/// EventEngine：
/// - 周期性执行 Outbox 中继，把暂存记录发布到 Bus
/// - 订阅 Bus 的事件流，按聚合散列入通道，串行分发到匹配的订阅
#[derive(Builder)]
pub struct EventEngine {
    event_bus: Arc<dyn EventBus>,
    outbox: Arc<dyn OutboxStore>,
    ledger: Arc<dyn IdempotencyLedger>,
    dead_letters: Arc<dyn DeadLetterStore>,
    #[builder(setters(vis = "pub(crate)"))]
    registry: SubscriptionSet,
    #[builder(default)]
    config: EventEngineConfig,
}

impl<S: BuilderState> EventEngineBuilder<S> {
    pub fn subscriptions(
        self,
        subscriptions: Vec<Subscription>,
    ) -> EventEngineBuilder<SetRegistry<S>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        self.registry(SubscriptionSet::new(subscriptions))
    }
}

impl EventEngine {
    /// 启动事件引擎，返回可用于关闭/等待/重放的句柄。
    ///
    /// 先建立总线订阅再启动中继，保证启动前暂存的记录不会在
    /// 订阅建立之前被发布而丢失。
    pub async fn start(self: Arc<Self>) -> EngineHandle {
        let token = CancellationToken::new();
        let lanes = self.config.lanes.max(1);
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(lanes + 2);

        let stream = self.event_bus.subscribe().await;

        // lane workers（串行消费，保证同聚合按暂存顺序投递）
        let dispatcher = Dispatcher::new(
            self.registry.clone(),
            self.ledger.clone(),
            self.dead_letters.clone(),
            self.config.handler_timeout,
        );
        let mut senders = Vec::with_capacity(lanes);
        for _ in 0..lanes {
            let (tx, rx) = mpsc::channel::<LaneJob>(self.config.lane_capacity);
            senders.push(tx);
            tasks.push(tokio::spawn(run_lane(
                dispatcher.clone(),
                rx,
                token.clone(),
            )));
        }
        let router = LaneRouter::new(senders);

        // relay worker（周期任务）
        {
            let relay = OutboxRelay::new(
                self.event_bus.clone(),
                self.outbox.clone(),
                self.config.relay_batch,
            );
            let interval = self.config.relay_interval;

            tasks.push(Self::spawn_periodic(token.clone(), interval, move || {
                let relay = relay.clone();
                async move {
                    if let Err(err) = relay.tick().await {
                        warn!(error = %err, "outbox relay tick failed");
                    }
                }
            }));
        }

        // subscribe worker（长循环）
        tasks.push(tokio::spawn(Self::subscribe_loop(
            stream,
            router.clone(),
            token.clone(),
        )));

        EngineHandle {
            token,
            tasks,
            router,
            subscriptions: self.registry.clone(),
            dead_letters: self.dead_letters.clone(),
        }
    }

    fn spawn_periodic<F, Fut>(
        token: CancellationToken,
        interval: Duration,
        mut f: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f().await,
                }
            }
        })
    }

    async fn subscribe_loop(
        mut stream: BoxStream<'static, DomainResult<EventRecord>>,
        router: LaneRouter,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    break;
                }
                maybe_event = stream.next() => {
                    match maybe_event {
                        Some(Ok(record)) => {
                            if let Err(err) = router.route(LaneJob::Deliver(record)).await {
                                error!(error = %err, "failed to route record to lane");
                            }
                        }
                        Some(Err(err)) => {
                            // 总线滞后等非致命错误：跳过，继续消费
                            warn!(error = %err, "event stream yielded an error");
                        }
                        None => {
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// 事件引擎配置
#[derive(Clone, Copy, Debug)]
pub struct EventEngineConfig {
    /// Outbox -> Bus 的中继间隔
    pub relay_interval: Duration,
    /// 单轮中继的批量上限
    pub relay_batch: usize,
    /// 按聚合散列的投递通道数
    pub lanes: usize,
    /// 每条通道的积压上限（入队满时对订阅循环形成背压）
    pub lane_capacity: usize,
    /// 单次处理器调用的超时，超时按瞬态失败重试
    pub handler_timeout: Duration,
}

impl Default for EventEngineConfig {
    fn default() -> Self {
        Self {
            relay_interval: Duration::from_secs(1),
            relay_batch: 64,
            lanes: 8,
            lane_capacity: 256,
            handler_timeout: Duration::from_secs(30),
        }
    }
}

/// 引擎运行句柄：用于优雅关闭、等待任务结束与死信重放
pub struct EngineHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    router: LaneRouter,
    subscriptions: SubscriptionSet,
    dead_letters: Arc<dyn DeadLetterStore>,
}

impl EngineHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }

    /// 重放一条死信：取出登记项，按原聚合通道重新投递给指定处理器。
    /// 重试预算重新起算；幂等账本照常生效，已成功过的投递会被吸收。
    pub async fn replay(&self, event_id: &str, handler_id: &str) -> DomainResult<()> {
        if self.subscriptions.find(handler_id).is_none() {
            return Err(DomainError::not_found(format!(
                "handler {handler_id} is not subscribed"
            )));
        }

        let letter = self
            .dead_letters
            .take(event_id, handler_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("dead letter {event_id}/{handler_id} not found"))
            })?;

        self.router
            .route(LaneJob::Replay {
                record: letter.record().clone(),
                handler_id: handler_id.to_string(),
            })
            .await
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
