//! 奖励账本（RewardLedger）
//!
//! 入账以幂等键去重：键由调用方构造（通常为 `事件ID:处理器ID`），
//! 同键重复调用返回 `AlreadyApplied` 且余额不变。该约定把
//! “入账成功但处理凭证落库前崩溃”的窗口也收敛为恰好一次。
//!
use super::ProviderError;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// 注册表中的能力名
pub const REWARD_LEDGER: &str = "reward.ledger";

/// 入账结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    /// 本次调用真实入账
    Applied,
    /// 幂等键已存在，入账被吸收
    AlreadyApplied,
}

#[async_trait]
pub trait RewardLedger: Send + Sync {
    /// 以幂等键入账
    async fn grant(
        &self,
        idempotency_key: &str,
        account: &str,
        amount: i64,
    ) -> Result<GrantOutcome, ProviderError>;
}

/// 内存奖励账本
#[derive(Default)]
pub struct InMemoryRewardLedger {
    /// idempotency_key -> (account, amount)
    grants: DashMap<String, (String, i64)>,
    balances: DashMap<String, i64>,
}

impl InMemoryRewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &str) -> i64 {
        self.balances.get(account).map(|b| *b).unwrap_or(0)
    }
}

#[async_trait]
impl RewardLedger for InMemoryRewardLedger {
    async fn grant(
        &self,
        idempotency_key: &str,
        account: &str,
        amount: i64,
    ) -> Result<GrantOutcome, ProviderError> {
        match self.grants.entry(idempotency_key.to_string()) {
            Entry::Occupied(_) => Ok(GrantOutcome::AlreadyApplied),
            Entry::Vacant(vacant) => {
                vacant.insert((account.to_string(), amount));
                *self.balances.entry(account.to_string()).or_insert(0) += amount;
                Ok(GrantOutcome::Applied)
            }
        }
    }
}
