use super::provider::Provider;
use super::{Completion, LlmError, Task};
use crate::http_client;
use isahc::prelude::*;
use isahc::Request;
use serde::{Deserialize, Serialize};

const COVER_MODEL: &str = "dall-e-3";
const COVER_SIZE: &str = "1024x1024";

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
}

#[derive(Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url }
    }

    // Returns a hosted image URL. The bot client can only send photos by
    // URL, so a URL is exactly what the digest builder needs.
    pub fn generate_image(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/images/generations", self.base_url);

        let body = ImageRequest {
            model: COVER_MODEL.to_string(),
            prompt: prompt.to_string(),
            n: 1,
            size: COVER_SIZE.to_string(),
        };

        let text = self.post(&url, &body)?;

        let parsed: ImageResponse =
            serde_json::from_str(&text).map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        parsed
            .data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or(LlmError::EmptyResponse)
    }

    fn post<T: Serialize>(&self, url: &str, body: &T) -> Result<String, LlmError> {
        let json =
            serde_json::to_string(body).map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        let request = Request::post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
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
            return Err(LlmError::Provider(format!("openai {status}: {text}")));
        }

        Ok(text)
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn default_model(&self, task: Task) -> &'static str {
        match task {
            Task::Narrative => "gpt-4o",
            _ => "gpt-4o-mini",
        }
    }

    fn supports_model(&self, model: &str) -> bool {
        model.starts_with("gpt") || model.starts_with("o1") || model.starts_with("o3")
    }

    fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<Completion, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut messages = vec![];

        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages,
        };

        let text = self.post(&url, &body)?;

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        let completion_text = parsed
            .choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.clone())
            .unwrap_or_default();

        if completion_text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let usage = parsed.usage;

        Ok(Completion {
            text: completion_text,
            prompt_tokens: usage.as_ref().map_or(0, |usage| usage.prompt_tokens),
            completion_tokens: usage.as_ref().map_or(0, |usage| usage.completion_tokens),
        })
    }
}
