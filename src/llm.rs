use fang::FangError;

pub mod anthropic;
pub mod breaker;
pub mod budget;
pub mod gateway;
pub mod google;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod usage;

pub use gateway::gateway;
pub use gateway::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Summarize,
    Cluster,
    Narrative,
    Topic,
    Score,
}

impl Task {
    pub fn override_key(&self) -> &'static str {
        match self {
            Task::Summarize => "llm_model:summarize",
            Task::Cluster => "llm_model:cluster",
            Task::Narrative => "llm_model:narrative",
            Task::Topic => "llm_model:topic",
            Task::Score => "llm_model:score",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum LlmError {
    RateLimited,
    CircuitOpen,
    EmptyResponse,
    Provider(String),
    BudgetExceeded,
}

impl From<LlmError> for FangError {
    fn from(error: LlmError) -> Self {
        let description = format!("llm error: {error:?}");

        Self { description }
    }
}

impl LlmError {
    // Rate limits, open circuits and provider failures fall through to the
    // next provider in priority order. Everything else surfaces immediately.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited | LlmError::CircuitOpen | LlmError::Provider(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}
