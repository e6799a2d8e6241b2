//! 事件发布形态（EventRecord）
//!
//! 定义事件在 Outbox 与总线上的标准形态、入库前校验，
//! 以及与 `EventEnvelope` 间的转换与批量工具函数。
//! 记录一经创建不可变；载荷允许新增字段（消费方须容忍未知字段），
//! 破坏性变更通过提升 `event_version` 并配合上抬链完成。
//!
use crate::{
    aggregate::Aggregate,
    domain_event::{DomainEvent, EventContext, EventEnvelope, Metadata},
    error::{DomainError, DomainResult},
    event_upcaster::EventUpcasterChain,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct EventRecord {
    /// 事件唯一标识符（全局唯一，不可变）
    event_id: String,
    /// 事件类型，用于订阅匹配
    event_type: String,
    /// 事件载荷版本，用于版本控制和上抬
    event_version: usize,
    /// 聚合 ID，标识事件所属的聚合根实例
    aggregate_id: String,
    /// 聚合类型，用于区分不同的聚合根
    aggregate_type: String,
    /// 聚合内因果序号（从 1 起单调递增），同一聚合按该序投递
    sequence: u64,
    /// 关联 ID，用于将多个事件关联到同一个业务操作
    correlation_id: Option<String>,
    /// 因果 ID，用于表示事件的触发来源
    causation_id: Option<String>,
    /// 触发事件的主体类型（如用户、系统等）
    actor_type: Option<String>,
    /// 触发事件的主体 ID
    actor_id: Option<String>,
    /// 事件发生时间
    occurred_at: DateTime<Utc>,
    /// 事件负载，存储事件的具体数据
    payload: Value,
}

impl EventRecord {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> usize {
        self.event_version
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_type(&self) -> Option<&str> {
        self.actor_type.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// 入库/发布前的结构校验；不合法的记录拒绝进入 Outbox 与总线。
    pub fn validate(&self) -> DomainResult<()> {
        if self.event_id.is_empty() {
            return Err(DomainError::validation("event_id must not be empty"));
        }
        if self.event_type.is_empty() {
            return Err(DomainError::validation("event_type must not be empty"));
        }
        if self.aggregate_id.is_empty() {
            return Err(DomainError::validation("aggregate_id must not be empty"));
        }
        if self.aggregate_type.is_empty() {
            return Err(DomainError::validation("aggregate_type must not be empty"));
        }
        if self.sequence == 0 {
            return Err(DomainError::validation("sequence must start from 1"));
        }
        Ok(())
    }
}

impl<A> TryFrom<&EventEnvelope<A>> for EventRecord
where
    A: Aggregate,
{
    type Error = serde_json::Error;

    fn try_from(envelope: &EventEnvelope<A>) -> Result<Self, Self::Error> {
        Ok(EventRecord {
            event_id: envelope.payload.event_id().to_string(),
            event_type: envelope.payload.event_type().to_string(),
            event_version: envelope.payload.event_version(),
            aggregate_id: envelope.metadata.aggregate_id().to_string(),
            aggregate_type: envelope.metadata.aggregate_type().to_string(),
            sequence: envelope.payload.sequence(),
            correlation_id: envelope.context.correlation_id().map(|s| s.to_string()),
            causation_id: envelope.context.causation_id().map(|s| s.to_string()),
            actor_type: envelope.context.actor_type().map(|s| s.to_string()),
            actor_id: envelope.context.actor_id().map(|s| s.to_string()),
            occurred_at: *envelope.metadata.occurred_at(),
            payload: serde_json::to_value(&envelope.payload)?,
        })
    }
}

impl<A> TryFrom<&EventRecord> for EventEnvelope<A>
where
    A: Aggregate,
{
    type Error = serde_json::Error;

    fn try_from(value: &EventRecord) -> Result<Self, Self::Error> {
        let metadata = Metadata::builder()
            .aggregate_id(value.aggregate_id.clone())
            .aggregate_type(value.aggregate_type.clone())
            .occurred_at(value.occurred_at)
            .build();

        let payload: A::Event = serde_json::from_value(value.payload.clone())?;

        let context = EventContext::builder()
            .maybe_correlation_id(value.correlation_id.clone())
            .maybe_causation_id(value.causation_id.clone())
            .maybe_actor_type(value.actor_type.clone())
            .maybe_actor_id(value.actor_id.clone())
            .build();

        Ok(EventEnvelope {
            metadata,
            payload,
            context,
        })
    }
}

pub fn serialize_events<A>(events: &[EventEnvelope<A>]) -> DomainResult<Vec<EventRecord>>
where
    A: Aggregate,
{
    let events = events
        .iter()
        .map(EventRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn deserialize_events<A>(
    upcaster_chain: &EventUpcasterChain,
    events: Vec<EventRecord>,
) -> DomainResult<Vec<EventEnvelope<A>>>
where
    A: Aggregate,
{
    let events = upcaster_chain.upcast_all(events)?;

    let events = events
        .iter()
        .map(EventEnvelope::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(DomainError::from)?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::entity::Entity;
    use crate::error::DomainError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Player {
        id: String,
        version: u64,
        name: String,
    }

    impl Entity for Player {
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

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum PlayerEvent {
        Named { id: String, sequence: u64, name: String },
    }

    impl DomainEvent for PlayerEvent {
        fn event_id(&self) -> &str {
            match self {
                PlayerEvent::Named { id, .. } => id,
            }
        }
        fn event_type(&self) -> &str {
            "player.named"
        }
        fn event_version(&self) -> usize {
            1
        }
        fn sequence(&self) -> u64 {
            match self {
                PlayerEvent::Named { sequence, .. } => *sequence,
            }
        }
    }

    impl Aggregate for Player {
        const TYPE: &'static str = "player";
        type Command = ();
        type Event = PlayerEvent;
        type Error = DomainError;
        fn execute(&self, _command: Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
            Ok(vec![])
        }
        fn apply(&mut self, event: &Self::Event) {
            match event {
                PlayerEvent::Named { sequence, name, .. } => {
                    self.name = name.clone();
                    self.version = *sequence;
                }
            }
        }
    }

    fn mk_envelope(name: &str) -> EventEnvelope<Player> {
        EventEnvelope::<Player>::new(
            &"p-1".to_string(),
            PlayerEvent::Named {
                id: ulid::Ulid::new().to_string(),
                sequence: 1,
                name: name.into(),
            },
            EventContext::builder()
                .maybe_correlation_id(Some("c-1".into()))
                .maybe_causation_id(Some("cause-1".into()))
                .maybe_actor_type(Some("user".into()))
                .maybe_actor_id(Some("u-actor".into()))
                .build(),
        )
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let env = mk_envelope("alice");

        let ser = serialize_events(&[env.clone()]).unwrap();
        assert_eq!(ser.len(), 1);
        assert_eq!(ser[0].aggregate_id(), "p-1");
        assert_eq!(ser[0].aggregate_type(), Player::TYPE);
        assert_eq!(ser[0].sequence(), 1);
        assert_eq!(ser[0].correlation_id(), Some("c-1"));
        assert_eq!(ser[0].actor_type(), Some("user"));
        assert_eq!(ser[0].actor_id(), Some("u-actor"));
        ser[0].validate().unwrap();

        let chain = EventUpcasterChain::default();
        let de = deserialize_events::<Player>(&chain, ser).unwrap();
        assert_eq!(de.len(), 1);
        assert_eq!(de[0].payload, env.payload);
        assert_eq!(de[0].metadata.aggregate_id(), env.metadata.aggregate_id());
        assert_eq!(de[0].context.correlation_id(), Some("c-1"));
    }

    #[test]
    fn validate_rejects_malformed_records() {
        let mut record = EventRecord::try_from(&mk_envelope("bob")).unwrap();
        record.event_id = String::new();
        match record.validate().unwrap_err() {
            DomainError::Validation { .. } => {}
            other => panic!("unexpected {other:?}"),
        }

        let mut record = EventRecord::try_from(&mk_envelope("bob")).unwrap();
        record.sequence = 0;
        match record.validate().unwrap_err() {
            DomainError::Validation { .. } => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn payload_tolerates_additive_fields() {
        // 旧消费者读新载荷：多出的字段被忽略
        let mut record = EventRecord::try_from(&mk_envelope("carol")).unwrap();
        if let Some(obj) = record
            .payload
            .get_mut("Named")
            .and_then(|v| v.as_object_mut())
        {
            obj.insert("nickname".to_string(), serde_json::json!("cc"));
        }

        let env = EventEnvelope::<Player>::try_from(&record).unwrap();
        match env.payload {
            PlayerEvent::Named { name, .. } => assert_eq!(name, "carol"),
        }
    }
}
