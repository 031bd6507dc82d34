use crate::schema::discoveries;
use chrono::{DateTime, Utc};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_REJECTED: &str = "rejected";
pub const STATUS_MATCHED: &str = "matched";

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = discoveries)]
pub struct Discovery {
    pub id: i64,
    pub source_type: String,
    pub username: Option<String>,
    pub peer_id: Option<i64>,
    pub invite_hash: Option<String>,
    pub title: Option<String>,
    pub discovery_count: i32,
    pub engagement: i64,
    pub status: String,

    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Discovery {
    pub fn is_terminal(&self) -> bool {
        self.status == STATUS_APPROVED || self.status == STATUS_REJECTED
    }

    pub fn display_name(&self) -> String {
        if let Some(username) = &self.username {
            return format!("@{}", username);
        }

        if let Some(peer_id) = self.peer_id {
            return format!("peer {}", peer_id);
        }

        match &self.invite_hash {
            Some(hash) => format!("invite {}", hash),
            None => format!("discovery {}", self.id),
        }
    }
}
