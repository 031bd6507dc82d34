use super::Command;
use crate::db::settings;
use crate::pipeline::filter::{MODE_ALLOWLIST, MODE_DENYLIST, MODE_MIXED};
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use serde_json::json;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/filters";

const USAGE: &str = "Usage: /filters [mode <mixed|allowlist|denylist> | allow <w1,w2> | \
deny <w1,w2> | minlen <n> | forwards <on|off> | ads <on|off>]";

#[derive(TypedBuilder)]
pub struct Filters {
    args: String,
}

impl Command for Filters {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let changed_by = message.from.as_ref().map(|user| user.id as i64).unwrap_or(0);

        let (action, value) = match self.args.trim().split_once(char::is_whitespace) {
            Some((action, value)) => (action, value.trim()),
            None => (self.args.trim(), ""),
        };

        let result = match action {
            "" => return self.show(&mut connection),

            "mode" if [MODE_MIXED, MODE_ALLOWLIST, MODE_DENYLIST].contains(&value) => {
                settings::save_with_history(
                    &mut connection,
                    settings::KEYWORD_MODE,
                    json!(value),
                    changed_by,
                )
            }

            "allow" => settings::save_with_history(
                &mut connection,
                settings::ALLOW_KEYWORDS,
                json!(split_words(value)),
                changed_by,
            ),

            "deny" => settings::save_with_history(
                &mut connection,
                settings::DENY_KEYWORDS,
                json!(split_words(value)),
                changed_by,
            ),

            "minlen" => match value.parse::<i64>() {
                Ok(min_length) if min_length >= 0 => settings::save_with_history(
                    &mut connection,
                    settings::MIN_LENGTH,
                    json!(min_length),
                    changed_by,
                ),
                _ => return USAGE.to_string(),
            },

            "forwards" => match on_off(value) {
                Some(skip) => settings::save_with_history(
                    &mut connection,
                    settings::SKIP_FORWARDS,
                    json!(skip),
                    changed_by,
                ),
                None => return USAGE.to_string(),
            },

            "ads" => match on_off(value) {
                Some(enabled) => settings::save_with_history(
                    &mut connection,
                    settings::ADS_FILTER_ENABLED,
                    json!(enabled),
                    changed_by,
                ),
                None => return USAGE.to_string(),
            },

            _ => return USAGE.to_string(),
        };

        match result {
            Ok(_) => self.show(&mut connection),
            Err(error) => {
                log::error!("Failed to save a filter setting: {:?}", error);
                "Failed to save the setting".to_string()
            }
        }
    }
}

impl Filters {
    pub fn command() -> &'static str {
        COMMAND
    }

    fn show(&self, conn: &mut PgConnection) -> String {
        format!(
            "Filters:\nmode: {}\nallow: {}\ndeny: {}\nmin length: {}\nskip forwards: {}\nads filter: {}",
            settings::get_string(conn, settings::KEYWORD_MODE, MODE_MIXED),
            join_or_none(settings::get_string_list(conn, settings::ALLOW_KEYWORDS)),
            join_or_none(settings::get_string_list(conn, settings::DENY_KEYWORDS)),
            settings::get_i64(conn, settings::MIN_LENGTH, 20),
            settings::get_bool(conn, settings::SKIP_FORWARDS, false),
            settings::get_bool(conn, settings::ADS_FILTER_ENABLED, true),
        )
    }
}

fn split_words(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}

fn on_off(value: &str) -> Option<bool> {
    match value {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn join_or_none(words: Vec<String>) -> String {
    if words.is_empty() {
        "none".to_string()
    } else {
        words.join(", ")
    }
}
