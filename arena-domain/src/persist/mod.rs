//! 持久化协议（persist）
//!
//! 定义可靠投递所需的存储协议及其内存实现，支持：
//! - 事件记录的序列化、校验与上抬（`EventRecord`、`serialize_events`、`deserialize_events`）；
//! - 事务性 Outbox 暂存与状态流转（`OutboxStore`、`OutboxEntry`）；
//! - 幂等账本的判重与登记（`IdempotencyLedger`）；
//! - 死信登记与取回（`DeadLetterStore`）；
//! - 聚合读写协议与内存组合实现（`AggregateRepository`、`InMemoryAggregateStore`）。
//!
//! 该模块聚焦协议与装配逻辑，具体存储后端（如 Postgres）由上层提供实现并注入。
//!
mod aggregate_repository;
mod dead_letter;
mod event_record;
mod ledger;
mod memory;
mod outbox;

pub use aggregate_repository::AggregateRepository;
pub use dead_letter::{DeadLetter, DeadLetterStore, InMemoryDeadLetterStore};
pub use event_record::{EventRecord, deserialize_events, serialize_events};
pub use ledger::{
    IdempotencyLedger, InMemoryIdempotencyLedger, LedgerStatus, ProcessedEventRecord,
};
pub use memory::InMemoryAggregateStore;
pub use outbox::{OutboxEntry, OutboxStatus, OutboxStore, validate_entries};
