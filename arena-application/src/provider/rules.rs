//! 比赛规则（GameRules）
//!
//! 报名前的规则校验与支付核验后的奖励额度。典型的多版本能力：
//! 规则调整通过注册新版本灰度放量，而非修改调用方。
//!
use super::ProviderError;
use super::tournaments::{TournamentState, TournamentView};
use async_trait::async_trait;

/// 注册表中的能力名
pub const GAME_RULES: &str = "game.rules";

#[async_trait]
pub trait GameRules: Send + Sync {
    /// 校验一次报名请求；违规返回 `Rejected`
    async fn validate_entry(
        &self,
        tournament: &TournamentView,
        player_id: &str,
    ) -> Result<(), ProviderError>;

    /// 支付核验通过后应发放的奖励额度
    async fn verification_bonus(&self, game: &str) -> Result<i64, ProviderError>;
}

/// 标准规则：开放赛事接受任何非空玩家，奖励额度固定
pub struct StandardRules {
    bonus: i64,
}

impl StandardRules {
    pub fn new(bonus: i64) -> Self {
        Self { bonus }
    }
}

#[async_trait]
impl GameRules for StandardRules {
    async fn validate_entry(
        &self,
        tournament: &TournamentView,
        player_id: &str,
    ) -> Result<(), ProviderError> {
        if tournament.state != TournamentState::Open {
            return Err(ProviderError::Rejected(format!(
                "tournament {} is not accepting entries",
                tournament.tournament_id
            )));
        }
        if player_id.trim().is_empty() {
            return Err(ProviderError::Rejected("player id is empty".into()));
        }
        Ok(())
    }

    async fn verification_bonus(&self, _game: &str) -> Result<i64, ProviderError> {
        Ok(self.bonus)
    }
}
