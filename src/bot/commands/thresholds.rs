use super::Command;
use crate::config::Config;
use crate::db::settings;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use serde_json::json;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/thresholds";

const USAGE: &str = "Usage: /thresholds [relevance <0-1> | importance <0-1>]";

#[derive(TypedBuilder)]
pub struct Thresholds {
    args: String,
}

impl Command for Thresholds {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let changed_by = message.from.as_ref().map(|user| user.id as i64).unwrap_or(0);
        let mut parts = self.args.split_whitespace();

        let key = match parts.next() {
            Some("relevance") => settings::RELEVANCE_THRESHOLD,
            Some("importance") => settings::IMPORTANCE_THRESHOLD,
            Some(_) => return USAGE.to_string(),
            None => {
                return format!(
                    "relevance: {:.2}\nimportance: {:.2}",
                    settings::get_f64(
                        &mut connection,
                        settings::RELEVANCE_THRESHOLD,
                        Config::relevance_threshold()
                    ),
                    settings::get_f64(
                        &mut connection,
                        settings::IMPORTANCE_THRESHOLD,
                        Config::importance_threshold()
                    ),
                )
            }
        };

        let value = match parts.next().and_then(|value| value.parse::<f64>().ok()) {
            Some(value) if (0.0..=1.0).contains(&value) => value,
            _ => return USAGE.to_string(),
        };

        match settings::save_with_history(&mut connection, key, json!(value), changed_by) {
            Ok(_) => format!("{} set to {:.2}", key, value),
            Err(error) => {
                log::error!("Failed to save {}: {:?}", key, error);
                "Failed to save the threshold".to_string()
            }
        }
    }
}

impl Thresholds {
    pub fn command() -> &'static str {
        COMMAND
    }
}
