//! 事件子系统（eventing）
//!
//! 提供事件发布/订阅与可靠分发的基础抽象与运行时：
//! - `EventBus`：统一发布/订阅接口（至少一次投递）；
//! - `OutboxRelay`：从 Outbox 批量取出待发布记录并推送到总线；
//! - `EventHandler` / `Subscription`：消费逻辑及其优先级、重试与幂等策略；
//! - `EventEngine`：编排中继、订阅与通道化分发，聚合内串行、聚合间并行，
//!   重试耗尽登记死信并支持运维重放。
//!
//! 该模块仅定义协议与引擎，不绑定具体传输实现，可对接任意消息系统或内存实现。
//!
pub mod bus;
pub mod bus_inmemory;
mod dispatcher;
pub mod engine;
pub mod handler;
pub mod relay;
pub mod subscription;

pub use bus::EventBus;
pub use bus_inmemory::InMemoryEventBus;
pub use engine::{EngineHandle, EventEngine, EventEngineConfig};
pub use handler::{EventHandler, HandledEventType};
pub use relay::OutboxRelay;
pub use subscription::{IdempotencyMode, RetryPolicy, Subscription, SubscriptionSet};
