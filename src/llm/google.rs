use super::provider::Provider;
use super::{Completion, LlmError, Task};
use crate::http_client;
use isahc::prelude::*;
use isahc::Request;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: i64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: i64,
}

impl GoogleProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url }
    }
}

impl Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn default_model(&self, task: Task) -> &'static str {
        match task {
            Task::Narrative => "gemini-1.5-pro",
            _ => "gemini-1.5-flash",
        }
    }

    fn supports_model(&self, model: &str) -> bool {
        model.starts_with("gemini")
    }

    fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<Completion, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: system.map(|text| Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }),
        };

        let json = serde_json::to_string(&body)
            .map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        let request = Request::post(url)
            .header("Content-Type", "application/json")
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
            return Err(LlmError::Provider(format!("google {status}: {text}")));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|error| LlmError::Provider(format!("{error:?}")))?;

        let completion_text = parsed
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<Vec<&str>>()
                    .join("")
            })
            .unwrap_or_default();

        if completion_text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let usage = parsed.usage_metadata;

        Ok(Completion {
            text: completion_text,
            prompt_tokens: usage.as_ref().map_or(0, |usage| usage.prompt_token_count),
            completion_tokens: usage
                .as_ref()
                .map_or(0, |usage| usage.candidates_token_count),
        })
    }
}
