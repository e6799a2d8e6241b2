//! 报名聚合（Registration）
//!
//! 状态机：`New --Open--> Open --VerifyPayment--> Verified`。
//! `execute` 只校验聚合自身不变量；跨边界校验（赛事是否开放、
//! 规则是否放行）由服务层在执行命令前完成。
//!
use arena_domain::aggregate::Aggregate;
use arena_domain::domain_event::DomainEvent;
use arena_domain::entity::Entity;
use arena_domain::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EVENT_REGISTRATION_CREATED: &str = "registration.created";
pub const EVENT_PAYMENT_VERIFIED: &str = "registration.payment_verified";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    #[default]
    New,
    Open,
    Verified,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registration {
    id: String,
    version: u64,
    tournament_id: Option<String>,
    player_id: Option<String>,
    game: Option<String>,
    state: RegistrationState,
}

impl Registration {
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn tournament_id(&self) -> Option<&str> {
        self.tournament_id.as_deref()
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }
}

impl Entity for Registration {
    type Id = String;

    fn new(aggregate_id: Self::Id) -> Self {
        Self {
            id: aggregate_id,
            ..Default::default()
        }
    }

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone)]
pub enum RegistrationCommand {
    Open {
        tournament_id: String,
        player_id: String,
        game: String,
    },
    VerifyPayment {
        payment_ref: String,
    },
}

/// 事件负载冗余 `player_id`/`game`，下游处理器无需回查聚合状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistrationEvent {
    Created {
        id: String,
        sequence: u64,
        tournament_id: String,
        player_id: String,
        game: String,
    },
    PaymentVerified {
        id: String,
        sequence: u64,
        payment_ref: String,
        player_id: String,
        game: String,
    },
}

impl DomainEvent for RegistrationEvent {
    fn event_id(&self) -> &str {
        match self {
            RegistrationEvent::Created { id, .. } => id,
            RegistrationEvent::PaymentVerified { id, .. } => id,
        }
    }

    fn event_type(&self) -> &str {
        match self {
            RegistrationEvent::Created { .. } => EVENT_REGISTRATION_CREATED,
            RegistrationEvent::PaymentVerified { .. } => EVENT_PAYMENT_VERIFIED,
        }
    }

    fn event_version(&self) -> usize {
        1
    }

    fn sequence(&self) -> u64 {
        match self {
            RegistrationEvent::Created { sequence, .. } => *sequence,
            RegistrationEvent::PaymentVerified { sequence, .. } => *sequence,
        }
    }
}

impl Aggregate for Registration {
    const TYPE: &'static str = "registration";
    type Command = RegistrationCommand;
    type Event = RegistrationEvent;
    type Error = DomainError;

    fn execute(&self, command: Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RegistrationCommand::Open {
                tournament_id,
                player_id,
                game,
            } => {
                if self.state != RegistrationState::New {
                    return Err(DomainError::InvalidState {
                        reason: format!("registration {} already opened", self.id),
                    });
                }
                Ok(vec![RegistrationEvent::Created {
                    id: Uuid::new_v4().to_string(),
                    sequence: self.version() + 1,
                    tournament_id,
                    player_id,
                    game,
                }])
            }
            RegistrationCommand::VerifyPayment { payment_ref } => match self.state {
                RegistrationState::Open => {
                    let (Some(player_id), Some(game)) =
                        (self.player_id.clone(), self.game.clone())
                    else {
                        return Err(DomainError::InvalidState {
                            reason: format!("registration {} missing player or game", self.id),
                        });
                    };
                    Ok(vec![RegistrationEvent::PaymentVerified {
                        id: Uuid::new_v4().to_string(),
                        sequence: self.version() + 1,
                        payment_ref,
                        player_id,
                        game,
                    }])
                }
                RegistrationState::New => Err(DomainError::InvalidState {
                    reason: format!("registration {} is not opened yet", self.id),
                }),
                RegistrationState::Verified => Err(DomainError::InvalidState {
                    reason: format!("registration {} already verified", self.id),
                }),
            },
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RegistrationEvent::Created {
                sequence,
                tournament_id,
                player_id,
                game,
                ..
            } => {
                self.tournament_id = Some(tournament_id.clone());
                self.player_id = Some(player_id.clone());
                self.game = Some(game.clone());
                self.state = RegistrationState::Open;
                self.version = *sequence;
            }
            RegistrationEvent::PaymentVerified { sequence, .. } => {
                self.state = RegistrationState::Verified;
                self.version = *sequence;
            }
        }
    }
}
