use crate::schema::digests;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = digests)]
pub struct Digest {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub item_ids: Value,
    pub posted_at: Option<DateTime<Utc>>,
    pub chat_id: Option<i64>,
    pub first_message_id: Option<i32>,
    pub up_votes: i32,
    pub down_votes: i32,
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Digest {
    pub fn item_ids(&self) -> Vec<i64> {
        match self.item_ids.as_array() {
            Some(values) => values.iter().filter_map(|value| value.as_i64()).collect(),
            None => vec![],
        }
    }
}
