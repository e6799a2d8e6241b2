//! 版本选择规则（SelectionRule）与灰度分桶
//!
//! 注册表解析能力时按固定顺序裁决：
//! 上下文钉选 > 强制版本 > 百分比灰度 > 默认版本。
//! 灰度分桶基于分流键的稳定散列，与进程、机器无关，保证同一聚合
//! 在整个灰度周期内看到同一提供方版本。
//!
use uuid::Uuid;

/// 一条注册的命中规则
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionRule {
    /// 强制版本：对全部流量生效，优先于灰度与默认（运维切换开关）
    Override,
    /// 百分比灰度：分流键桶位落入 `[0, percent)` 时命中
    Rollout { percent: u8 },
    /// 默认版本：无其他规则命中时兜底
    Default,
}

/// 分流键 -> `[0, 100)` 桶位的稳定映射
pub fn rollout_bucket(key: &str) -> u8 {
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}
