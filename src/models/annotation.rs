use crate::schema::annotations;
use chrono::{DateTime, Utc};

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = annotations)]
pub struct Annotation {
    pub id: i64,
    pub item_id: i64,
    pub assigned_to: Option<i64>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub label: Option<String>,
    pub comment: Option<String>,
    pub labeled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}
