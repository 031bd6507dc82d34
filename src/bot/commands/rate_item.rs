use super::Command;
use crate::db::ratings;
use crate::models::item_rating::{VALUE_BAD, VALUE_GOOD, VALUE_IRRELEVANT};
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/rate";

const USAGE: &str = "Usage: /rate <item_id> <good|bad|irrelevant> [comment]";

#[derive(TypedBuilder)]
pub struct RateItem {
    args: String,
}

impl Command for RateItem {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let user_id = match message.from.as_ref() {
            Some(user) => user.id as i64,
            None => return "Rating needs a user".to_string(),
        };

        let mut parts = self.args.split_whitespace();

        let item_id = match parts.next().and_then(|id| id.parse::<i64>().ok()) {
            Some(item_id) => item_id,
            None => return USAGE.to_string(),
        };

        let value = match parts.next() {
            Some(value) if [VALUE_GOOD, VALUE_BAD, VALUE_IRRELEVANT].contains(&value) => {
                value.to_string()
            }
            _ => return USAGE.to_string(),
        };

        let comment = {
            let rest = parts.collect::<Vec<&str>>().join(" ");
            (!rest.is_empty()).then_some(rest)
        };

        match ratings::save_item_rating(&mut connection, item_id, user_id, &value, comment) {
            Ok(_) => format!("Item {} rated {}", item_id, value),
            Err(error) => {
                log::error!("Failed to rate item {}: {:?}", item_id, error);
                "Failed to save the rating; does the item exist?".to_string()
            }
        }
    }
}

impl RateItem {
    pub fn command() -> &'static str {
        COMMAND
    }
}
