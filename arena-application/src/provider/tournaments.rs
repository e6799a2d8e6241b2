//! 赛事目录（TournamentDirectory）
use super::ProviderError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// 注册表中的能力名
pub const TOURNAMENT_DIRECTORY: &str = "tournament.directory";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentState {
    Open,
    Locked,
    Finished,
}

/// 赛事快照（对外只读视图）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TournamentView {
    pub tournament_id: String,
    pub game: String,
    pub state: TournamentState,
    pub entry_fee: i64,
}

#[async_trait]
pub trait TournamentDirectory: Send + Sync {
    /// 查询赛事快照；不存在返回 `NotFound`
    async fn find(&self, tournament_id: &str) -> Result<TournamentView, ProviderError>;
}

/// 内存赛事目录
#[derive(Default)]
pub struct InMemoryTournamentDirectory {
    tournaments: DashMap<String, TournamentView>,
}

impl InMemoryTournamentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, view: TournamentView) {
        self.tournaments.insert(view.tournament_id.clone(), view);
    }
}

#[async_trait]
impl TournamentDirectory for InMemoryTournamentDirectory {
    async fn find(&self, tournament_id: &str) -> Result<TournamentView, ProviderError> {
        self.tournaments
            .get(tournament_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ProviderError::NotFound(format!("tournament {tournament_id}")))
    }
}
