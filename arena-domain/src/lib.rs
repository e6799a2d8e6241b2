//! 赛事平台领域内核（arena-domain）
//!
//! 提供显式事件分发与可靠投递所需的通用抽象与运行时，用于在应用中实现：
//! - 聚合（`aggregate`）与实体（`entity`）建模
//! - 领域事件（`domain_event`）与事件上抬（`event_upcaster`）
//! - 事务性 Outbox、幂等台账与死信（`persist`）
//! - 事件分发（`eventing`）：总线、中继、泳道调度、引擎与处理器
//!
//! 本 crate 尽量保持与存储与传输实现解耦，仅定义领域层接口、内存实现与
//! 最小必要的错误类型，以便在不同基础设施（例如 Postgres、消息中间件等）
//! 上进行适配实现。
//!
//! 典型用法：
//! 1. 定义聚合、命令与事件，实现在 `Aggregate` 上的 `execute/apply`；
//! 2. 通过 `AggregateRoot` 将“命令 → 事件 → 聚合状态 + Outbox”原子提交；
//! 3. 使用 `eventing` 构建事件引擎，声明订阅（优先级/重试/幂等模式）；
//! 4. 引擎周期性将 Outbox 中的待发事件发布至总线，并按聚合泳道有序分发。
//!
pub mod aggregate;
pub mod aggregate_root;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod event_upcaster;
#[cfg(feature = "eventing")]
pub mod eventing;
pub mod persist;
