//! 支付核验奖励处理器（AwardCoinsHandler）
//!
//! 订阅 `registration.payment_verified`：按规则提供方给出的额度为
//! 玩家入账奖励金币。入账携带 `{event_id}:{handler_id}` 幂等键，
//! 即使“入账成功但账本记录未落库”的窗口内进程崩溃，重投递也只会
//! 得到 `AlreadyApplied`，余额不会二次变动。
//!
use crate::context::AppContext;
use crate::provider::{GAME_RULES, GameRules, GrantOutcome, REWARD_LEDGER, RewardLedger};
use crate::registration::{EVENT_PAYMENT_VERIFIED, RegistrationEvent};
use crate::registry::CapabilityRegistry;
use arena_domain::error::{DomainError, DomainResult};
use arena_domain::eventing::{EventHandler, HandledEventType};
use arena_domain::persist::EventRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// 处理器稳定标识（幂等账本与死信的键）
pub const AWARD_COINS: &str = "award-coins";

pub struct AwardCoinsHandler {
    registry: Arc<CapabilityRegistry>,
}

impl AwardCoinsHandler {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventHandler for AwardCoinsHandler {
    fn handler_id(&self) -> &str {
        AWARD_COINS
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One(EVENT_PAYMENT_VERIFIED.to_string())
    }

    async fn handle(&self, record: &EventRecord) -> DomainResult<()> {
        let event: RegistrationEvent = serde_json::from_value(record.payload().clone())?;
        let RegistrationEvent::PaymentVerified {
            player_id, game, ..
        } = event
        else {
            return Err(DomainError::permanent(format!(
                "handler {AWARD_COINS} received unexpected event {}",
                record.event_type()
            )));
        };

        let ctx = AppContext::for_aggregate(record.aggregate_id());
        let rules = self.registry.resolve::<dyn GameRules>(GAME_RULES, &ctx)?;
        let amount = rules.verification_bonus(&game).await?;

        let ledger = self
            .registry
            .resolve::<dyn RewardLedger>(REWARD_LEDGER, &ctx)?;
        let key = format!("{}:{}", record.event_id(), AWARD_COINS);
        match ledger.grant(&key, &player_id, amount).await? {
            GrantOutcome::Applied => {
                tracing::debug!(player_id = %player_id, amount, "verification bonus granted");
            }
            GrantOutcome::AlreadyApplied => {
                tracing::debug!(player_id = %player_id, "verification bonus already granted");
            }
        }
        Ok(())
    }
}
