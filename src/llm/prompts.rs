use crate::db::settings;
use diesel::PgConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBase {
    Summarize,
    Narrative,
    ClusterSummary,
    ClusterTopic,
    RelevanceGate,
}

const DEFAULT_SUMMARIZE: &str = "Summarize the following Telegram post in 1-3 plain sentences. \
Keep concrete facts, numbers and names. Answer in the language of the post. \
Return only the summary, no preamble.";

const DEFAULT_NARRATIVE: &str = "You are the editor of a news digest. Given the list of item \
summaries below, write a short editorial overview (2-4 sentences) connecting the main themes. \
Return only the overview text.";

const DEFAULT_CLUSTER_SUMMARY: &str = "The following summaries describe the same event as \
reported by different Telegram channels. Merge them into a single summary of 1-2 sentences. \
Return only the merged summary.";

const DEFAULT_CLUSTER_TOPIC: &str = "Assign one coarse topic (one or two words, e.g. \"crypto\", \
\"ai\", \"politics\") to the following post summary. Return only the topic.";

const DEFAULT_RELEVANCE_GATE: &str = "Rate the following Telegram post for a technology news \
digest. Respond with JSON {\"relevance\": r, \"importance\": i} where r and i are numbers \
between 0 and 1. Return only the JSON.";

impl PromptBase {
    pub fn key(&self) -> &'static str {
        match self {
            PromptBase::Summarize => "summarize",
            PromptBase::Narrative => "narrative",
            PromptBase::ClusterSummary => "cluster_summary",
            PromptBase::ClusterTopic => "cluster_topic",
            PromptBase::RelevanceGate => "relevance_gate",
        }
    }

    pub fn default_text(&self) -> &'static str {
        match self {
            PromptBase::Summarize => DEFAULT_SUMMARIZE,
            PromptBase::Narrative => DEFAULT_NARRATIVE,
            PromptBase::ClusterSummary => DEFAULT_CLUSTER_SUMMARY,
            PromptBase::ClusterTopic => DEFAULT_CLUSTER_TOPIC,
            PromptBase::RelevanceGate => DEFAULT_RELEVANCE_GATE,
        }
    }
}

// `prompt:<base>:active` names a version, `prompt:<base>:<version>` stores
// its text. Anything missing falls back to the built-in default.
pub fn active(conn: &mut PgConnection, base: PromptBase) -> String {
    let active_key = format!("prompt:{}:active", base.key());

    let version = match settings::get(conn, &active_key) {
        Some(value) => match value.as_str() {
            Some(version) => version.to_string(),
            None => return base.default_text().to_string(),
        },
        None => return base.default_text().to_string(),
    };

    let version_key = format!("prompt:{}:{}", base.key(), version);

    match settings::get(conn, &version_key).and_then(|value| {
        value.as_str().map(|text| text.to_string())
    }) {
        Some(text) => text,
        None => base.default_text().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::PromptBase;
    use crate::db;
    use crate::db::settings;
    use diesel::result::Error;
    use diesel::Connection;
    use serde_json::json;

    #[test]
    fn falls_back_to_default_without_active_version() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let text = super::active(connection, PromptBase::Summarize);

            assert_eq!(text, PromptBase::Summarize.default_text());

            Ok(())
        });
    }

    #[test]
    fn resolves_the_selected_version() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            settings::save_with_history(connection, "prompt:summarize:v2", json!("Shorter."), 1)
                .unwrap();
            settings::save_with_history(connection, "prompt:summarize:active", json!("v2"), 1)
                .unwrap();

            let text = super::active(connection, PromptBase::Summarize);

            assert_eq!(text, "Shorter.");

            Ok(())
        });
    }

    #[test]
    fn missing_version_text_falls_back_to_default() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            settings::save_with_history(connection, "prompt:narrative:active", json!("v9"), 1)
                .unwrap();

            let text = super::active(connection, PromptBase::Narrative);

            assert_eq!(text, PromptBase::Narrative.default_text());

            Ok(())
        });
    }
}
