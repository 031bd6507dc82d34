use super::{Completion, LlmError, Task};

pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_model(&self, task: Task) -> &'static str;

    // Whether an operator-supplied model override belongs to this provider.
    fn supports_model(&self, model: &str) -> bool;

    fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<Completion, LlmError>;
}
