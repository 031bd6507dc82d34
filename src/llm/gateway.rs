use super::anthropic::AnthropicProvider;
use super::breaker::CircuitBreaker;
use super::budget;
use super::google::GoogleProvider;
use super::openai::OpenAiProvider;
use super::prompts;
use super::prompts::PromptBase;
use super::provider::Provider;
use super::{Completion, LlmError, Task};
use crate::config::Config;
use crate::db::settings;
use diesel::PgConnection;
use serde::Deserialize;
use std::sync::OnceLock;

static GATEWAY: OnceLock<Gateway> = OnceLock::new();

const GROUPING_PROMPT: &str = "The following numbered summaries describe Telegram posts. Group \
near-duplicates that cover the same event. Respond with JSON: a list of lists of item numbers, \
every number appearing exactly once. Example: [[1,3],[2]].";

const COVER_COMPRESS_PROMPT: &str = "Compress the following digest summaries into one visual \
scene description of at most 30 words, suitable as an image generation prompt. Return only the \
description.";

pub struct ProviderEntry {
    pub provider: Box<dyn Provider>,
    pub breaker: CircuitBreaker,
}

pub struct Gateway {
    entries: Vec<ProviderEntry>,
}

#[derive(Deserialize)]
struct ScoreResponse {
    relevance: f64,
    importance: f64,
}

pub fn gateway() -> &'static Gateway {
    GATEWAY.get_or_init(Gateway::from_config)
}

impl Gateway {
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        let entries = providers
            .into_iter()
            .map(|provider| ProviderEntry {
                provider,
                breaker: CircuitBreaker::default(),
            })
            .collect();

        Self { entries }
    }

    // Priority order is fixed: Google, then Anthropic, then OpenAI. A
    // provider without a configured key is simply absent.
    pub fn from_config() -> Self {
        let mut providers: Vec<Box<dyn Provider>> = vec![];

        if let Some(key) = Config::google_api_key() {
            providers.push(Box::new(GoogleProvider::new(key, Config::google_base_url())));
        }

        if let Some(key) = Config::anthropic_api_key() {
            providers.push(Box::new(AnthropicProvider::new(
                key,
                Config::anthropic_base_url(),
            )));
        }

        if let Some(key) = Config::openai_api_key() {
            providers.push(Box::new(OpenAiProvider::new(key, Config::openai_base_url())));
        }

        Self::new(providers)
    }

    pub fn complete(
        &self,
        conn: &mut PgConnection,
        task: Task,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<Completion, LlmError> {
        budget::check(conn)?;

        // Overrides are re-read on every call, so operator changes apply to
        // the next request without a restart.
        let override_model = settings::get(conn, task.override_key())
            .and_then(|value| value.as_str().map(|model| model.to_string()));

        let mut last_error = LlmError::Provider("no llm providers configured".to_string());

        for entry in &self.entries {
            if !entry.breaker.allow_request() {
                last_error = LlmError::CircuitOpen;
                continue;
            }

            let model = match &override_model {
                Some(model) if entry.provider.supports_model(model) => model.clone(),
                _ => entry.provider.default_model(task).to_string(),
            };

            match entry.provider.complete(&model, system, prompt) {
                Ok(completion) => {
                    entry.breaker.record_success();
                    budget::record(
                        conn,
                        entry.provider.name(),
                        &model,
                        completion.prompt_tokens,
                        completion.completion_tokens,
                    );

                    return Ok(completion);
                }
                Err(error) => {
                    if error.is_retriable() {
                        log::error!(
                            "Provider {} failed for {:?}: {:?}",
                            entry.provider.name(),
                            task,
                            error
                        );
                        entry.breaker.record_failure();
                        last_error = error;
                        continue;
                    }

                    return Err(error);
                }
            }
        }

        Err(last_error)
    }

    pub fn summarize(
        &self,
        conn: &mut PgConnection,
        text: &str,
        channel_context: Option<&str>,
    ) -> Result<String, LlmError> {
        let system = prompts::active(conn, PromptBase::Summarize);

        let prompt = match channel_context {
            Some(context) => format!("Channel: {}\n\n{}", context, text),
            None => text.to_string(),
        };

        let completion = self.complete(conn, Task::Summarize, Some(&system), &prompt)?;

        let summary = completion.text.trim().to_string();

        if summary.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(summary)
    }

    pub fn score(&self, conn: &mut PgConnection, text: &str) -> Result<(f64, f64), LlmError> {
        let system = prompts::active(conn, PromptBase::RelevanceGate);

        let completion = self.complete(conn, Task::Score, Some(&system), text)?;

        let stripped = strip_code_fences(&completion.text);

        let parsed: ScoreResponse = serde_json::from_str(stripped)
            .map_err(|error| LlmError::Provider(format!("unparsable score: {error:?}")))?;

        Ok((
            parsed.relevance.clamp(0.0, 1.0),
            parsed.importance.clamp(0.0, 1.0),
        ))
    }

    pub fn topic(&self, conn: &mut PgConnection, summary: &str) -> Result<String, LlmError> {
        let system = prompts::active(conn, PromptBase::ClusterTopic);

        let completion = self.complete(conn, Task::Topic, Some(&system), summary)?;

        Ok(completion.text.trim().trim_matches('"').to_lowercase())
    }

    // Returns zero-based index groups forming a partition of the input.
    pub fn cluster(
        &self,
        conn: &mut PgConnection,
        summaries: &[String],
    ) -> Result<Vec<Vec<usize>>, LlmError> {
        let numbered = summaries
            .iter()
            .enumerate()
            .map(|(index, summary)| format!("{}. {}", index + 1, summary))
            .collect::<Vec<String>>()
            .join("\n");

        let completion = self.complete(conn, Task::Cluster, Some(GROUPING_PROMPT), &numbered)?;

        let stripped = strip_code_fences(&completion.text);

        let groups: Vec<Vec<usize>> = serde_json::from_str(stripped)
            .map_err(|error| LlmError::Provider(format!("unparsable clusters: {error:?}")))?;

        let mut seen = vec![false; summaries.len()];

        for group in &groups {
            for number in group {
                let index = number.checked_sub(1);

                match index {
                    Some(index) if index < summaries.len() && !seen[index] => seen[index] = true,
                    _ => {
                        return Err(LlmError::Provider(
                            "cluster response is not a partition".to_string(),
                        ))
                    }
                }
            }
        }

        if seen.iter().any(|marked| !marked) {
            return Err(LlmError::Provider(
                "cluster response is not a partition".to_string(),
            ));
        }

        Ok(groups
            .into_iter()
            .map(|group| group.into_iter().map(|number| number - 1).collect())
            .collect())
    }

    pub fn narrative(
        &self,
        conn: &mut PgConnection,
        summaries: &[String],
    ) -> Result<String, LlmError> {
        let system = prompts::active(conn, PromptBase::Narrative);
        let prompt = summaries.join("\n- ");

        let completion = self.complete(conn, Task::Narrative, Some(&system), &prompt)?;

        Ok(completion.text.trim().to_string())
    }

    pub fn merge_cluster_summary(
        &self,
        conn: &mut PgConnection,
        summaries: &[String],
    ) -> Result<String, LlmError> {
        let system = prompts::active(conn, PromptBase::ClusterSummary);
        let prompt = summaries.join("\n\n");

        let completion = self.complete(conn, Task::Cluster, Some(&system), &prompt)?;

        Ok(completion.text.trim().to_string())
    }

    pub fn compress_summaries_for_cover(
        &self,
        conn: &mut PgConnection,
        summaries: &[String],
    ) -> Result<String, LlmError> {
        let prompt = summaries.join("\n");

        let completion =
            self.complete(conn, Task::Narrative, Some(COVER_COMPRESS_PROMPT), &prompt)?;

        Ok(completion.text.trim().to_string())
    }

    // Returns a hosted image URL, or an error the caller downgrades to a
    // text-only digest.
    pub fn generate_digest_cover(
        &self,
        conn: &mut PgConnection,
        topics: &[String],
        narrative: Option<&str>,
    ) -> Result<String, LlmError> {
        let openai = match (Config::openai_api_key(), Config::openai_base_url()) {
            (Some(key), base_url) => OpenAiProvider::new(key, base_url),
            (None, _) => {
                return Err(LlmError::Provider(
                    "cover generation needs an openai key".to_string(),
                ))
            }
        };

        budget::check(conn)?;

        let scene = match narrative {
            Some(narrative) => {
                self.compress_summaries_for_cover(conn, &[narrative.to_string()])?
            }
            None => topics.join(", "),
        };

        let prompt = format!(
            "Minimalist editorial illustration for a news digest about: {}",
            scene
        );

        openai.generate_image(&prompt)
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);

    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::super::google::GoogleProvider;
    use super::super::openai::OpenAiProvider;
    use super::super::provider::Provider;
    use super::super::{LlmError, Task};
    use super::Gateway;
    use crate::db;
    use crate::db::{llm_usage, settings};
    use chrono::Utc;
    use diesel::result::Error;
    use diesel::Connection;
    use serde_json::json;

    fn google(server: &mockito::ServerGuard) -> Box<dyn Provider> {
        Box::new(GoogleProvider::new("test-key".to_string(), server.url()))
    }

    fn openai(server: &mockito::ServerGuard) -> Box<dyn Provider> {
        Box::new(OpenAiProvider::new("test-key".to_string(), server.url()))
    }

    fn google_ok_body() -> String {
        json!({
            "candidates": [{"content": {"parts": [{"text": "A summary."}]}}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
        })
        .to_string()
    }

    fn openai_ok_body(content: &str) -> String {
        json!({
            "choices": [{"message": {"content": content}}],
            "usage": {"prompt_tokens": 7, "completion_tokens": 3}
        })
        .to_string()
    }

    #[test]
    fn routes_to_secondary_when_primary_fails() {
        let mut primary = mockito::Server::new();
        let mut secondary = mockito::Server::new();

        let failing = primary
            .mock("POST", mockito::Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create();
        let succeeding = secondary
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(openai_ok_body("Fallback summary."))
            .create();

        let gateway = Gateway::new(vec![google(&primary), openai(&secondary)]);

        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let completion = gateway
                .complete(connection, Task::Summarize, None, "text")
                .unwrap();

            assert_eq!(completion.text, "Fallback summary.");

            // Usage lands on the provider that answered.
            let today = Utc::now().date_naive();
            let rows = llm_usage::rows_for_day(connection, today).unwrap();

            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].provider, "openai");
            assert_eq!(rows[0].prompt_tokens, 7);

            Ok(())
        });

        failing.assert();
        succeeding.assert();
    }

    #[test]
    fn opens_the_circuit_after_sustained_failures() {
        let mut primary = mockito::Server::new();
        let mut secondary = mockito::Server::new();

        let failing = primary
            .mock("POST", mockito::Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .expect(5)
            .create();
        secondary
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(openai_ok_body("ok"))
            .expect(6)
            .create();

        let gateway = Gateway::new(vec![google(&primary), openai(&secondary)]);

        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            // Five failures open the breaker; the sixth call must skip the
            // primary entirely.
            for _ in 0..6 {
                gateway
                    .complete(connection, Task::Summarize, None, "text")
                    .unwrap();
            }

            Ok(())
        });

        failing.assert();
    }

    #[test]
    fn model_override_applies_to_the_matching_provider() {
        let mut server = mockito::Server::new();

        let mocked = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent?key=test-key")
            .with_status(200)
            .with_body(google_ok_body())
            .create();

        let gateway = Gateway::new(vec![google(&server)]);

        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            settings::save_with_history(
                connection,
                Task::Summarize.override_key(),
                json!("gemini-1.5-pro"),
                1,
            )
            .unwrap();

            gateway
                .complete(connection, Task::Summarize, None, "text")
                .unwrap();

            Ok(())
        });

        mocked.assert();
    }

    #[test]
    fn budget_exhaustion_surfaces_immediately() {
        let mut server = mockito::Server::new();

        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(200)
            .with_body(google_ok_body())
            .expect(0)
            .create();

        let gateway = Gateway::new(vec![google(&server)]);

        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            settings::save_with_history(connection, settings::LLM_DAILY_BUDGET, json!(100), 1)
                .unwrap();

            let today = Utc::now().date_naive();
            llm_usage::record(connection, today, "google", "gemini-1.5-flash", 90, 20, 0.0)
                .unwrap();

            let result = gateway.complete(connection, Task::Summarize, None, "text");

            assert_eq!(result.unwrap_err(), LlmError::BudgetExceeded);

            Ok(())
        });
    }

    #[test]
    fn score_parses_fenced_json() {
        let mut server = mockito::Server::new();

        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(200)
            .with_body(openai_ok_body(
                "```json\n{\"relevance\": 0.9, \"importance\": 1.4}\n```",
            ))
            .create();

        let gateway = Gateway::new(vec![openai(&server)]);

        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let (relevance, importance) = gateway.score(connection, "text").unwrap();

            assert_eq!(relevance, 0.9);
            // Out-of-range values clamp into [0, 1].
            assert_eq!(importance, 1.0);

            Ok(())
        });
    }

    #[test]
    fn cluster_rejects_non_partitions() {
        let mut server = mockito::Server::new();

        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(200)
            .with_body(openai_ok_body("[[1, 1], [2]]"))
            .create();

        let gateway = Gateway::new(vec![openai(&server)]);

        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let summaries = vec!["a".to_string(), "b".to_string()];
            let result = gateway.cluster(connection, &summaries);

            assert!(matches!(result, Err(LlmError::Provider(_))));

            Ok(())
        });
    }
}
