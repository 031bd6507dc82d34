use crate::schema::clusters;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = clusters)]
pub struct Cluster {
    pub id: i64,
    pub digest_id: Option<i64>,
    pub topic: Option<String>,
    pub summary: Option<String>,
    pub item_ids: Value,
    pub created_at: DateTime<Utc>,
}
