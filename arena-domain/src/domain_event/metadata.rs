use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 事件归属元数据：所属聚合与发生时间。
/// `occurred_at` 以事件产生时刻为准，发布与重放不再改写。
#[derive(Builder, Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// 所属聚合实例
    aggregate_id: String,
    /// 所属聚合类型（`Aggregate::TYPE`）
    aggregate_type: String,
    /// 事件发生时间（UTC）
    occurred_at: DateTime<Utc>,
}

impl Metadata {
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn occurred_at(&self) -> &DateTime<Utc> {
        &self.occurred_at
    }
}
