//! 能力注册表（CapabilityRegistry）
//!
//! 以能力名（如 `"game.rules"`）登记多个版本的提供方实现，解析时按
//! 固定顺序裁决出恰好一个：上下文钉选 > 强制版本 > 百分比灰度 > 默认版本。
//! - 注册阶段整体校验：重复版本、多个强制/默认/灰度、类型不一致
//!   一律在 `build` 时报错，坏配置不进入运行期；
//! - 提供方以类型擦除（`Any` 持有 `Arc<C>`）方式存放，`resolve` 按
//!   调用方声明的接口类型取回；
//! - 快照不可变，`reload` 原子替换，进行中的解析继续使用旧快照。
//!
use crate::{
    context::AppContext,
    error::AppError,
    selection::{SelectionRule, rollout_bucket},
};
use arc_swap::ArcSwap;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 一条能力注册：版本、命中规则与类型擦除的提供方句柄
struct Registration {
    capability: String,
    version: String,
    rule: SelectionRule,
    type_id: TypeId,
    type_name: &'static str,
    /// 内部为 `Arc<C>`，`C` 是注册时的接口类型
    handle: Box<dyn Any + Send + Sync>,
}

/// 注册表构造器：收集注册项，`build` 时整体校验
#[derive(Default)]
pub struct RegistryBuilder {
    pending: Vec<Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个提供方版本。`C` 通常是 `dyn Trait` 形式的接口类型，
    /// 解析时必须使用同一类型取回。
    pub fn register<C>(
        mut self,
        capability: impl Into<String>,
        version: impl Into<String>,
        provider: Arc<C>,
        rule: SelectionRule,
    ) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.pending.push(Registration {
            capability: capability.into(),
            version: version.into(),
            rule,
            type_id: TypeId::of::<Arc<C>>(),
            type_name: type_name::<C>(),
            handle: Box::new(provider),
        });
        self
    }

    /// 校验并固化为可解析的注册表
    pub fn build(self) -> Result<CapabilityRegistry, AppError> {
        let snapshot = RegistrySnapshot::try_from_pending(self.pending)?;
        Ok(CapabilityRegistry {
            snapshot: ArcSwap::new(Arc::new(snapshot)),
        })
    }
}

/// 不可变注册快照：能力名 -> 各版本注册项
struct RegistrySnapshot {
    slots: HashMap<String, Vec<Registration>>,
}

impl RegistrySnapshot {
    fn try_from_pending(pending: Vec<Registration>) -> Result<Self, AppError> {
        let mut slots: HashMap<String, Vec<Registration>> = HashMap::new();

        for registration in pending {
            let slot = slots.entry(registration.capability.clone()).or_default();

            if slot.iter().any(|r| r.version == registration.version) {
                return Err(AppError::AlreadyRegistered {
                    capability: registration.capability,
                    version: registration.version,
                });
            }
            if let Some(first) = slot.first()
                && first.type_id != registration.type_id
            {
                return Err(AppError::AmbiguousRegistration {
                    capability: registration.capability,
                    reason: format!(
                        "providers disagree on interface: {} vs {}",
                        first.type_name, registration.type_name
                    ),
                });
            }
            slot.push(registration);
        }

        for (capability, slot) in &slots {
            let overrides = slot
                .iter()
                .filter(|r| r.rule == SelectionRule::Override)
                .count();
            if overrides > 1 {
                return Err(AppError::AmbiguousRegistration {
                    capability: capability.clone(),
                    reason: format!("{overrides} override versions"),
                });
            }

            let defaults = slot
                .iter()
                .filter(|r| r.rule == SelectionRule::Default)
                .count();
            if defaults > 1 {
                return Err(AppError::AmbiguousRegistration {
                    capability: capability.clone(),
                    reason: format!("{defaults} default versions"),
                });
            }

            let rollouts = slot
                .iter()
                .filter(|r| matches!(r.rule, SelectionRule::Rollout { .. }))
                .count();
            if rollouts > 1 {
                return Err(AppError::AmbiguousRegistration {
                    capability: capability.clone(),
                    reason: format!("{rollouts} rollout versions"),
                });
            }

            for registration in slot {
                if let SelectionRule::Rollout { percent } = registration.rule
                    && percent > 100
                {
                    return Err(AppError::AmbiguousRegistration {
                        capability: capability.clone(),
                        reason: format!("rollout percent {percent} beyond 100"),
                    });
                }
            }
        }

        Ok(Self { slots })
    }

    /// 裁决顺序：钉选版本 > 强制版本 > 灰度桶位命中 > 默认版本
    fn select(&self, capability: &str, ctx: &AppContext) -> Option<&Registration> {
        let slot = self.slots.get(capability)?;

        if let Some(version) = ctx.overrides.get(capability)
            && let Some(pinned) = slot.iter().find(|r| &r.version == version)
        {
            return Some(pinned);
        }

        if let Some(forced) = slot.iter().find(|r| r.rule == SelectionRule::Override) {
            return Some(forced);
        }

        if let Some(key) = ctx.rollout_key.as_deref()
            && let Some(candidate) = slot
                .iter()
                .find(|r| matches!(r.rule, SelectionRule::Rollout { .. }))
            && let SelectionRule::Rollout { percent } = candidate.rule
            && rollout_bucket(key) < percent
        {
            return Some(candidate);
        }

        slot.iter().find(|r| r.rule == SelectionRule::Default)
    }
}

/// 解析入口：读路径无锁，重载原子替换
pub struct CapabilityRegistry {
    snapshot: ArcSwap<RegistrySnapshot>,
}

impl CapabilityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// 解析出恰好一个提供方。能力未注册或无规则命中返回
    /// `NotRegistered`；接口类型与注册时不一致返回 `TypeMismatch`。
    pub fn resolve<C>(&self, capability: &str, ctx: &AppContext) -> Result<Arc<C>, AppError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let snapshot = self.snapshot.load();
        let registration =
            snapshot
                .select(capability, ctx)
                .ok_or_else(|| AppError::NotRegistered {
                    capability: capability.to_string(),
                })?;

        let provider = registration
            .handle
            .downcast_ref::<Arc<C>>()
            .cloned()
            .ok_or_else(|| AppError::TypeMismatch {
                capability: capability.to_string(),
                expected: type_name::<C>(),
            })?;

        debug!(
            capability,
            version = %registration.version,
            "capability resolved"
        );
        Ok(provider)
    }

    /// 原子替换注册快照；校验失败时保留旧快照
    pub fn reload(&self, builder: RegistryBuilder) -> Result<(), AppError> {
        let snapshot = RegistrySnapshot::try_from_pending(builder.pending)?;
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }
}
