use super::provider::Provider;
use super::{Completion, LlmError, Task};
use crate::http_client;
use isahc::prelude::*;
use isahc::Request;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct RequestMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: i64,
    #[serde(default)]
    output_tokens: i64,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url }
    }
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn default_model(&self, task: Task) -> &'static str {
        match task {
            Task::Narrative => "claude-3-5-sonnet-latest",
            _ => "claude-3-5-haiku-latest",
        }
    }

    fn supports_model(&self, model: &str) -> bool {
        model.starts_with("claude")
    }

    fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<Completion, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);

        let body = MessagesRequest {
            model: model.to_string(),
            max_tokens: MAX_TOKENS,
            messages: vec![RequestMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: system.map(|text| text.to_string()),
        };

        let json = serde_json::to_string(&body)
            .map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        let request = Request::post(url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .body(json)
            .map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        let mut response = http_client::client()
            .send(request)
            .map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(LlmError::RateLimited);
        }

        let text = response
            .text()
            .map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        if status >= 400 {
            return Err(LlmError::Provider(format!("anthropic {status}: {text}")));
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        let completion_text = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<&str>>()
            .join("");

        if completion_text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let usage = parsed.usage;

        Ok(Completion {
            text: completion_text,
            prompt_tokens: usage.as_ref().map_or(0, |usage| usage.input_tokens),
            completion_tokens: usage.as_ref().map_or(0, |usage| usage.output_tokens),
        })
    }
}
