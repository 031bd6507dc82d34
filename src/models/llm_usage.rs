use crate::schema::llm_usage;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = llm_usage)]
pub struct LlmUsage {
    pub id: i64,
    pub day: NaiveDate,
    pub provider: String,
    pub model: String,
    pub requests: i32,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cost_usd: f64,

    pub updated_at: DateTime<Utc>,
}

impl LlmUsage {
    pub fn total_tokens(&self) -> i64 {
        self.prompt_tokens + self.completion_tokens
    }
}
