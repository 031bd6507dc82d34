use crate::schema::setting_history;
use crate::schema::settings;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = settings)]
#[diesel(primary_key(key))]
pub struct Setting {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = setting_history)]
pub struct SettingHistory {
    pub id: i64,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub changed_by: i64,
    pub changed_at: DateTime<Utc>,
}
