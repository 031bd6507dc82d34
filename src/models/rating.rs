use crate::schema::ratings;
use chrono::{DateTime, Utc};

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = ratings)]
pub struct Rating {
    pub id: i64,
    pub digest_id: i64,
    pub user_id: i64,
    pub value: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
