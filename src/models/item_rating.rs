use crate::schema::item_ratings;
use chrono::{DateTime, Utc};

pub const VALUE_GOOD: &str = "good";
pub const VALUE_BAD: &str = "bad";
pub const VALUE_IRRELEVANT: &str = "irrelevant";

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = item_ratings)]
pub struct ItemRating {
    pub id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub value: String,
    pub comment: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
