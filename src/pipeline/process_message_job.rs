use super::filter;
use super::filter::Filter;
use crate::db;
use crate::db::items::NewItem;
use crate::db::settings;
use crate::llm;
use crate::llm::LlmError;
use crate::models::item::{STATUS_ERROR, STATUS_PENDING, STATUS_READY_PENDING, STATUS_REJECTED};
use crate::models::{Channel, RawMessage};
use diesel::PgConnection;
use fang::typetag;
use fang::FangError;
use fang::Queueable;
use fang::Runnable;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug)]
pub struct ProcessMessageJob {
    raw_id: i64,
}

struct Outcome {
    summary: String,
    topic: Option<String>,
    relevance: f64,
    importance: f64,
    status: &'static str,
    error: Option<Value>,
    drop_reason: Option<String>,
}

impl ProcessMessageJob {
    pub fn new(raw_id: i64) -> Self {
        Self { raw_id }
    }

    pub fn process(&self, conn: &mut PgConnection) -> Result<(), FangError> {
        let raw_message = match db::raw_messages::find(conn, self.raw_id) {
            Some(raw_message) => raw_message,
            None => {
                log::error!("Raw message {} disappeared before processing", self.raw_id);
                return Ok(());
            }
        };

        let channel = match db::channels::find(conn, raw_message.channel_id) {
            Some(channel) => channel,
            None => {
                log::error!("Channel {} not found for raw message", raw_message.channel_id);
                return Ok(());
            }
        };

        let outcome = self.run_stages(conn, &raw_message, &channel);

        self.store_outcome(conn, &raw_message, outcome)?;

        db::raw_messages::mark_processed(conn, raw_message.id).map_err(db_error)?;

        Ok(())
    }

    fn run_stages(
        &self,
        conn: &mut PgConnection,
        raw_message: &RawMessage,
        channel: &Channel,
    ) -> Outcome {
        let message_filter = Filter::load(conn);

        if let Some(reason) = message_filter.evaluate(&raw_message.text, raw_message.is_forward) {
            return Outcome::rejected(reason);
        }

        let channel_context = channel.title.clone().or_else(|| channel.username.clone());

        let summary = match llm::gateway().summarize(
            conn,
            &raw_message.text,
            channel_context.as_deref(),
        ) {
            Ok(summary) => summary,
            Err(error) => return Outcome::from_llm_error(error),
        };

        let (relevance, importance) = match llm::gateway().score(conn, &raw_message.text) {
            Ok(scores) => scores,
            Err(error) => return Outcome::from_llm_error(error),
        };

        let threshold = filter::effective_relevance_threshold(conn, channel);

        if relevance < threshold {
            // Below the gate is a drop, not an error.
            let mut outcome = Outcome::rejected("below_relevance");
            outcome.summary = summary;
            outcome.relevance = relevance;
            outcome.importance = importance;

            return outcome;
        }

        let topic = if settings::get_bool(conn, settings::TOPICS_ENABLED, false) {
            match llm::gateway().topic(conn, &summary) {
                Ok(topic) => Some(topic),
                Err(error) => {
                    // Topics are decoration; their failure never blocks an item.
                    log::error!("Topic assignment failed for {}: {:?}", raw_message.id, error);
                    None
                }
            }
        } else {
            None
        };

        Outcome {
            summary,
            topic,
            relevance,
            importance,
            status: STATUS_READY_PENDING,
            error: None,
            drop_reason: None,
        }
    }

    fn store_outcome(
        &self,
        conn: &mut PgConnection,
        raw_message: &RawMessage,
        outcome: Outcome,
    ) -> Result<(), FangError> {
        let new_item = NewItem {
            raw_id: raw_message.id,
            channel_id: raw_message.channel_id,
            summary: outcome.summary,
            topic: outcome.topic,
            relevance: outcome.relevance,
            importance: outcome.importance,
            status: outcome.status.to_string(),
            error: outcome.error,
            drop_reason: outcome.drop_reason,
            content_hash: raw_message.content_hash.clone(),
            tg_date: raw_message.tg_date,
        };

        match db::items::find_by_raw_id(conn, raw_message.id) {
            // A retried item is pending again; anything else is settled.
            Some(item) if item.status == STATUS_PENDING => {
                db::items::update_outcome(conn, item.id, &new_item).map_err(db_error)?;
            }
            Some(_) => (),
            None => {
                db::items::create(conn, new_item).map_err(db_error)?;
            }
        }

        Ok(())
    }
}

impl Outcome {
    fn rejected(reason: &str) -> Self {
        Self {
            summary: String::new(),
            topic: None,
            relevance: 0.0,
            importance: 0.0,
            status: STATUS_REJECTED,
            error: None,
            drop_reason: Some(reason.to_string()),
        }
    }

    fn from_llm_error(error: LlmError) -> Self {
        let kind = match &error {
            LlmError::EmptyResponse => "empty_summary",
            LlmError::BudgetExceeded => "budget_exceeded",
            LlmError::RateLimited => "rate_limited",
            LlmError::CircuitOpen => "circuit_open",
            LlmError::Provider(_) => "provider_error",
        };

        Self {
            summary: String::new(),
            topic: None,
            relevance: 0.0,
            importance: 0.0,
            status: STATUS_ERROR,
            error: Some(json!({ "kind": kind, "detail": format!("{:?}", error) })),
            drop_reason: None,
        }
    }
}

#[typetag::serde]
impl Runnable for ProcessMessageJob {
    fn run(&self, _queue: &dyn Queueable) -> Result<(), FangError> {
        let mut connection = db::pool().get()?;

        self.process(&mut connection)
    }

    fn task_type(&self) -> String {
        super::JOB_TYPE.to_string()
    }

    fn uniq(&self) -> bool {
        true
    }
}

fn db_error(error: diesel::result::Error) -> FangError {
    FangError {
        description: format!("{:?}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::ProcessMessageJob;
    use crate::db;
    use crate::db::{channels, items, raw_messages, settings};
    use crate::llm::LlmError;
    use crate::models::item::{STATUS_ERROR, STATUS_READY_PENDING, STATUS_REJECTED};
    use diesel::result::Error;
    use diesel::Connection;
    use serde_json::json;

    #[test]
    fn filter_drop_writes_a_drop_reason_without_llm_calls() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            settings::save_with_history(connection, settings::DENY_KEYWORDS, json!(["casino"]), 1)
                .unwrap();

            let channel = channels::create_by_username(connection, "rustlang").unwrap();
            let raw = raw_messages::create(
                connection,
                raw_messages::tests::build_message(
                    channel.id,
                    1,
                    "Join our online casino for great prizes",
                ),
            )
            .unwrap()
            .unwrap();

            ProcessMessageJob::new(raw.id).process(connection).unwrap();

            let item = items::find_by_raw_id(connection, raw.id).unwrap();

            assert_eq!(item.status, STATUS_REJECTED);
            assert_eq!(item.drop_reason, Some("deny_keyword".to_string()));

            let raw = raw_messages::find(connection, raw.id).unwrap();
            assert!(raw.processed);

            Ok(())
        });
    }

    #[test]
    fn missing_raw_message_is_not_an_error() {
        let mut connection = db::establish_test_connection();

        let result = ProcessMessageJob::new(123456789).process(&mut connection);

        assert!(result.is_ok());
    }

    #[test]
    fn outcome_statuses_match_the_state_machine() {
        let rejected = super::Outcome::rejected("ads");
        assert_eq!(rejected.status, STATUS_REJECTED);
        assert_eq!(rejected.drop_reason, Some("ads".to_string()));

        let errored = super::Outcome::from_llm_error(LlmError::EmptyResponse);
        assert_eq!(errored.status, STATUS_ERROR);
        assert_eq!(errored.error.unwrap()["kind"], "empty_summary");

        assert_eq!(STATUS_READY_PENDING, "ready_pending");
    }
}
