use crate::schema::items;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_READY_PENDING: &str = "ready_pending";
pub const STATUS_READY_DIGESTED: &str = "ready_digested";
pub const STATUS_REJECTED: &str = "rejected";
pub const STATUS_ERROR: &str = "error";

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = items)]
pub struct Item {
    pub id: i64,
    pub raw_id: i64,
    pub channel_id: i64,
    pub summary: String,
    pub topic: Option<String>,
    pub relevance: f64,
    pub importance: f64,
    pub status: String,
    pub error: Option<Value>,
    pub drop_reason: Option<String>,
    pub content_hash: String,
    pub tg_date: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn weighted_importance(&self, channel_weight: f64) -> f64 {
        self.importance * channel_weight
    }
}
