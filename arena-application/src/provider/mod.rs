//! 能力提供方协议（provider）
//!
//! 每个横切能力以 trait 定义接口，连同版本与选择规则登记到
//! `CapabilityRegistry`，调用方只面向接口解析，不感知具体版本：
//! - `TournamentDirectory`：赛事目录查询；
//! - `GameRules`：报名校验与奖励额度；
//! - `RewardLedger`：带幂等键的奖励入账；
//! - `NotificationSender`：模板通知发送。
//!
//! 随附的内存实现用于测试与本地开发，语义与真实后端对齐。
//!
pub mod notifications;
pub mod rewards;
pub mod rules;
pub mod tournaments;

pub use notifications::{
    InMemoryNotificationSender, NOTIFICATION_SENDER, NotificationSender, SendTicket,
};
pub use rewards::{GrantOutcome, InMemoryRewardLedger, REWARD_LEDGER, RewardLedger};
pub use rules::{GAME_RULES, GameRules, StandardRules};
pub use tournaments::{
    InMemoryTournamentDirectory, TOURNAMENT_DIRECTORY, TournamentDirectory, TournamentState,
    TournamentView,
};

use arena_domain::error::DomainError;

/// 提供方统一错误：调用方据此决定重试与否
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// `Unavailable` 是唯一可重试的类别，其余都会直接终止投递
impl From<ProviderError> for DomainError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(reason) => DomainError::not_found(reason),
            ProviderError::Unavailable(reason) => DomainError::transient(reason),
            ProviderError::InvalidState(reason) | ProviderError::Rejected(reason) => {
                DomainError::permanent(reason)
            }
        }
    }
}
