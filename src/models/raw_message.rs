use crate::schema::raw_messages;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = raw_messages)]
pub struct RawMessage {
    pub id: i64,
    pub channel_id: i64,
    pub tg_message_id: i32,
    pub tg_date: DateTime<Utc>,
    pub text: String,
    pub entities: Option<Value>,
    pub media: Option<Value>,
    pub link_preview: Option<Value>,
    pub content_hash: String,
    pub is_forward: bool,
    pub views: i32,
    pub forwards: i32,
    pub processed: bool,
    pub discovery_extracted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RawMessage {
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}
