//! 事件上抬（Event Upcasting）
//!
//! 当事件载荷结构演进时，通过上抬器（`EventUpcaster`）在读取路径对旧事件进行
//! 逐步转换（拆分/合并/重命名/丢弃等），`EventUpcasterChain` 负责串联多步转换
//! 并在稳定后返回。消费方因此只需理解每种事件类型的当前载荷版本。
//!
use crate::{error::DomainResult as Result, persist::EventRecord};
use std::sync::Arc;

/// 事件版本升级器（Upcaster）
pub trait EventUpcaster: Send + Sync {
    fn applies(&self, event_type: &str, event_version: usize) -> bool;

    fn upcast(&self, event: EventRecord) -> Result<EventUpcasterResult>;
}

impl<T> EventUpcaster for Arc<T>
where
    T: EventUpcaster + ?Sized,
{
    fn applies(&self, event_type: &str, event_version: usize) -> bool {
        (**self).applies(event_type, event_version)
    }

    fn upcast(&self, event: EventRecord) -> Result<EventUpcasterResult> {
        (**self).upcast(event)
    }
}

/// 升级结果：单个、新的多个、或丢弃
#[allow(clippy::large_enum_variant)]
pub enum EventUpcasterResult {
    One(EventRecord),
    Many(Vec<EventRecord>),
    Drop,
}

/// 事件升级链：按顺序应用多个 Upcaster
pub struct EventUpcasterChain {
    stages: Vec<Arc<dyn EventUpcaster>>,
}

impl Default for EventUpcasterChain {
    fn default() -> Self {
        Self::from_iter(vec![])
    }
}

impl EventUpcasterChain {
    /// 对一批事件进行升级，直到不再有升级发生
    pub fn upcast_all(&self, mut events: Vec<EventRecord>) -> Result<Vec<EventRecord>> {
        loop {
            let (upcasted, has_changes) = self.upcast_once(events)?;
            if !has_changes {
                return Ok(upcasted);
            }
            events = upcasted;
        }
    }

    /// 执行一轮完整的升级，返回升级后的事件列表和是否有变化
    fn upcast_once(&self, events: Vec<EventRecord>) -> Result<(Vec<EventRecord>, bool)> {
        let mut has_changes = false;

        let upcasted = events
            .into_iter()
            .map(|event| self.upcast_single_event(event, &mut has_changes))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        Ok((upcasted, has_changes))
    }

    /// 处理单个事件通过所有升级阶段
    fn upcast_single_event(
        &self,
        event: EventRecord,
        has_changes: &mut bool,
    ) -> Result<Vec<EventRecord>> {
        self.stages.iter().try_fold(vec![event], |events, stage| {
            self.apply_stage(stage, events, has_changes)
        })
    }

    /// 对事件列表应用单个升级器
    fn apply_stage(
        &self,
        stage: &Arc<dyn EventUpcaster>,
        events: Vec<EventRecord>,
        has_changes: &mut bool,
    ) -> Result<Vec<EventRecord>> {
        let results = events
            .into_iter()
            .map(|event| {
                if stage.applies(event.event_type(), event.event_version()) {
                    *has_changes = true;
                    stage.upcast(event)
                } else {
                    Ok(EventUpcasterResult::One(event))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(results
            .into_iter()
            .flat_map(|result| match result {
                EventUpcasterResult::One(e) => vec![e],
                EventUpcasterResult::Many(v) => v,
                EventUpcasterResult::Drop => vec![],
            })
            .collect())
    }
}

impl FromIterator<Arc<dyn EventUpcaster>> for EventUpcasterChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn EventUpcaster>>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

impl Extend<Arc<dyn EventUpcaster>> for EventUpcasterChain {
    fn extend<I: IntoIterator<Item = Arc<dyn EventUpcaster>>>(&mut self, iter: I) {
        self.stages.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::{EventUpcaster, EventUpcasterChain, EventUpcasterResult};
    use crate::error::{DomainError, DomainResult};
    use crate::persist::EventRecord;
    use chrono::Utc;
    use std::sync::Arc;

    fn mk_record(ty: &str, ver: usize, payload: serde_json::Value) -> EventRecord {
        EventRecord::builder()
            .event_id(ulid::Ulid::new().to_string())
            .event_type(ty.to_string())
            .event_version(ver)
            .aggregate_id("r-1".to_string())
            .aggregate_type("registration".to_string())
            .sequence(1)
            .correlation_id("cor-r-1".into())
            .causation_id("cau-r-1".into())
            .actor_type("user".into())
            .actor_id("u-1".into())
            .occurred_at(Utc::now())
            .payload(payload)
            .build()
    }

    fn rebuilt(event: &EventRecord, ty: &str, ver: usize, payload: serde_json::Value) -> EventRecord {
        EventRecord::builder()
            .event_id(event.event_id().to_string())
            .event_type(ty.to_string())
            .event_version(ver)
            .aggregate_id(event.aggregate_id().to_string())
            .aggregate_type(event.aggregate_type().to_string())
            .sequence(event.sequence())
            .maybe_correlation_id(event.correlation_id().map(|s| s.to_string()))
            .maybe_causation_id(event.causation_id().map(|s| s.to_string()))
            .maybe_actor_type(event.actor_type().map(|s| s.to_string()))
            .maybe_actor_id(event.actor_id().map(|s| s.to_string()))
            .occurred_at(event.occurred_at())
            .payload(payload)
            .build()
    }

    struct SplitV1; // v1 -> two events
    impl EventUpcaster for SplitV1 {
        fn applies(&self, event_type: &str, event_version: usize) -> bool {
            event_type == "legacy.registration.created" && event_version == 1
        }

        fn upcast(&self, event: EventRecord) -> DomainResult<EventUpcasterResult> {
            let id = event
                .payload()
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let init = rebuilt(
                &event,
                "registration.init",
                2,
                serde_json::json!({ "id": id, "stage": "init" }),
            );
            let meta = rebuilt(
                &event,
                "registration.meta",
                1,
                serde_json::json!({ "id": id, "meta": {"source": "legacy"} }),
            );

            Ok(EventUpcasterResult::Many(vec![init, meta]))
        }
    }

    struct DropMeta; // drop registration.meta events
    impl EventUpcaster for DropMeta {
        fn applies(&self, event_type: &str, _event_version: usize) -> bool {
            event_type == "registration.meta"
        }
        fn upcast(&self, _event: EventRecord) -> DomainResult<EventUpcasterResult> {
            Ok(EventUpcasterResult::Drop)
        }
    }

    struct RenameInitToCreated; // v2 init -> v3 created
    impl EventUpcaster for RenameInitToCreated {
        fn applies(&self, event_type: &str, event_version: usize) -> bool {
            event_type == "registration.init" && event_version == 2
        }
        fn upcast(&self, event: EventRecord) -> DomainResult<EventUpcasterResult> {
            let payload = event.payload().clone();
            let next = rebuilt(&event, "registration.created", 3, payload);
            Ok(EventUpcasterResult::One(next))
        }
    }

    #[test]
    fn complex_chain_split_drop_until_stable() {
        let chain: EventUpcasterChain = vec![
            Arc::new(SplitV1) as Arc<dyn EventUpcaster>,
            Arc::new(DropMeta) as Arc<dyn EventUpcaster>,
            Arc::new(RenameInitToCreated) as Arc<dyn EventUpcaster>,
        ]
        .into_iter()
        .collect();

        let legacy = mk_record(
            "legacy.registration.created",
            1,
            serde_json::json!({"id": "r-1"}),
        );
        let other = mk_record("noop", 1, serde_json::json!({"x": 1}));

        let input = vec![legacy, other.clone()];
        let out = chain.upcast_all(input).unwrap();

        // 期望：legacy 生成 init(v2) + meta(v1)，随后 meta 被 Drop，init(v2) -> created(v3)
        // 另一个事件保持不变
        assert_eq!(out.len(), 2);
        let types: Vec<(String, usize)> = out
            .iter()
            .map(|e| (e.event_type().to_string(), e.event_version()))
            .collect();
        assert!(types.contains(&("registration.created".to_string(), 3)));
        assert!(types.contains(&(other.event_type().to_string(), other.event_version())));
    }

    struct AlwaysFail;
    impl EventUpcaster for AlwaysFail {
        fn applies(&self, _event_type: &str, _event_version: usize) -> bool {
            true
        }
        fn upcast(&self, event: EventRecord) -> DomainResult<EventUpcasterResult> {
            Err(DomainError::UpcastFailed {
                event_type: event.event_type().to_string(),
                from_version: event.event_version(),
                stage: Some("AlwaysFail"),
                reason: "boom".into(),
            })
        }
    }

    #[test]
    fn upcast_failure_returns_error() {
        let chain: EventUpcasterChain = vec![Arc::new(AlwaysFail) as Arc<dyn EventUpcaster>]
            .into_iter()
            .collect();
        let input = vec![mk_record("noop", 1, serde_json::json!({}))];
        let err = chain.upcast_all(input).unwrap_err();
        match err {
            DomainError::UpcastFailed { .. } => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_chain_keeps_events_untouched() {
        let chain = EventUpcasterChain::default();
        let input = vec![mk_record("registration.created", 3, serde_json::json!({}))];
        let out = chain.upcast_all(input.clone()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_type(), input[0].event_type());
        assert_eq!(out[0].event_version(), input[0].event_version());
    }
}
