//! 报名服务（RegistrationService）
//!
//! 薄编排层：解析能力提供方 → 跨边界校验 → 执行聚合命令。
//! 聚合状态与 Outbox 条目由仓储在同一提交单元内落库，
//! 服务自身不直接发布事件。
//!
use crate::context::AppContext;
use crate::error::AppError;
use crate::provider::{
    GAME_RULES, GameRules, TOURNAMENT_DIRECTORY, TournamentDirectory, TournamentState,
};
use crate::registration::{Registration, RegistrationCommand};
use crate::registry::CapabilityRegistry;
use arena_domain::aggregate_root::AggregateRoot;
use arena_domain::error::DomainError;
use arena_domain::persist::AggregateRepository;
use std::sync::Arc;

pub struct RegistrationService<R>
where
    R: AggregateRepository<Registration>,
{
    root: AggregateRoot<Registration, R>,
    registry: Arc<CapabilityRegistry>,
}

impl<R> RegistrationService<R>
where
    R: AggregateRepository<Registration>,
{
    pub fn new(repo: R, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            root: AggregateRoot::new(repo),
            registry,
        }
    }

    /// 开启一次报名：
    /// 1. 查询赛事目录，确认赛事处于开放状态；
    /// 2. 交由规则提供方校验该玩家的报名资格；
    /// 3. 执行 `Open` 命令，聚合状态与 `registration.created` 同批提交。
    pub async fn open(
        &self,
        registration_id: &str,
        tournament_id: &str,
        player_id: &str,
        ctx: &AppContext,
    ) -> Result<(), AppError> {
        let directory = self
            .registry
            .resolve::<dyn TournamentDirectory>(TOURNAMENT_DIRECTORY, ctx)?;
        let tournament = directory
            .find(tournament_id)
            .await
            .map_err(DomainError::from)?;
        if tournament.state != TournamentState::Open {
            return Err(AppError::Validation(format!(
                "tournament {tournament_id} is not open for registration"
            )));
        }

        let rules = self.registry.resolve::<dyn GameRules>(GAME_RULES, ctx)?;
        rules
            .validate_entry(&tournament, player_id)
            .await
            .map_err(DomainError::from)?;

        self.root
            .execute(
                &registration_id.to_string(),
                RegistrationCommand::Open {
                    tournament_id: tournament.tournament_id.clone(),
                    player_id: player_id.to_string(),
                    game: tournament.game.clone(),
                },
                ctx.event.clone(),
            )
            .await?;

        tracing::debug!(registration_id, tournament_id, player_id, "registration opened");
        Ok(())
    }

    /// 核验支付：执行 `VerifyPayment` 命令，
    /// 产生 `registration.payment_verified` 事件。
    pub async fn verify_payment(
        &self,
        registration_id: &str,
        payment_ref: &str,
        ctx: &AppContext,
    ) -> Result<(), AppError> {
        self.root
            .execute(
                &registration_id.to_string(),
                RegistrationCommand::VerifyPayment {
                    payment_ref: payment_ref.to_string(),
                },
                ctx.event.clone(),
            )
            .await?;

        tracing::debug!(registration_id, payment_ref, "payment verified");
        Ok(())
    }

    /// 只读加载报名当前状态
    pub async fn load(&self, registration_id: &str) -> Result<Option<Registration>, AppError> {
        Ok(self.root.load(&registration_id.to_string()).await?)
    }
}
