use crate::schema::channels;
use chrono::{DateTime, Utc};

pub const WEIGHT_MODE_AUTO: &str = "auto";
pub const WEIGHT_MODE_MANUAL: &str = "manual";

pub const MIN_WEIGHT: f64 = 0.1;
pub const MAX_WEIGHT: f64 = 2.0;

#[derive(Queryable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = channels)]
pub struct Channel {
    pub id: i64,
    pub peer_id: Option<i64>,
    pub access_hash: Option<i64>,
    pub username: Option<String>,
    pub invite_link: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub importance_weight: f64,
    pub weight_mode: String,
    pub relevance_delta: Option<f64>,
    pub last_tg_message_id: i32,
    pub active: bool,
    pub error: Option<String>,
    pub fetch_retries: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn display_name(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }

        if let Some(username) = &self.username {
            return format!("@{}", username);
        }

        format!("channel {}", self.id)
    }

    pub fn auto_weight(&self) -> bool {
        self.weight_mode == WEIGHT_MODE_AUTO
    }
}
