use arena_domain::domain_event::EventContext;
use std::collections::HashMap;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用（命令/事件处理）所需的横切信息，例如：
/// - 事件语境（`EventContext`）：关联追踪 `correlation_id`、因果链 `causation_id`、
///   执行者类型/ID 等；
/// - 版本钉选（`overrides`）：能力名 -> 版本，命中时绕过灰度直接使用该版本；
/// - 分流键（`rollout_key`）：百分比灰度的稳定散列输入，通常取聚合 ID，
///   保证同一聚合在灰度期间始终落在同一提供方版本。
///
/// 典型用法：
/// ```rust
/// use arena_application::context::AppContext;
///
/// let ctx = AppContext::for_aggregate("reg-1")
///     .with_override("game.rules", "v2");
/// assert_eq!(ctx.rollout_key.as_deref(), Some("reg-1"));
/// assert_eq!(ctx.overrides.get("game.rules").map(String::as_str), Some("v2"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    /// 事件语境（链路追踪、审计主体、操作因果）
    pub event: EventContext,
    /// 版本钉选：能力名 -> 版本
    pub overrides: HashMap<String, String>,
    /// 分流键（可选）：为空则百分比灰度不生效，直接落到默认版本
    pub rollout_key: Option<String>,
}

impl AppContext {
    /// 以聚合 ID 为分流键构造上下文
    pub fn for_aggregate(aggregate_id: impl Into<String>) -> Self {
        Self {
            rollout_key: Some(aggregate_id.into()),
            ..Default::default()
        }
    }

    /// 钉选某个能力的版本
    pub fn with_override(
        mut self,
        capability: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.overrides.insert(capability.into(), version.into());
        self
    }

    /// 替换事件语境
    pub fn with_event(mut self, event: EventContext) -> Self {
        self.event = event;
        self
    }
}
