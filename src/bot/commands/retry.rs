use super::Command;
use crate::db::items;
use crate::models::item::STATUS_ERROR;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/retry";

#[derive(TypedBuilder)]
pub struct Retry {
    args: String,
}

impl Command for Retry {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        match self.args.trim() {
            // The bulk requeue is destructive enough to ask for confirmation.
            "" => match items::count_by_status(&mut connection, STATUS_ERROR) {
                Ok(0) => "No failed items".to_string(),
                Ok(count) => format!(
                    "{} failed items. Send /retry confirm to requeue all of them, \
                     or /retry <item_id> for one.",
                    count
                ),
                Err(error) => {
                    log::error!("Failed to count failed items: {:?}", error);
                    "Failed to count failed items".to_string()
                }
            },

            "confirm" => match items::retry_failed(&mut connection) {
                Ok(count) => format!("Requeued {} failed items", count),
                Err(error) => {
                    log::error!("Failed to retry items: {:?}", error);
                    "Failed to requeue items".to_string()
                }
            },

            id => match id.parse::<i64>() {
                Ok(id) => match items::retry(&mut connection, id) {
                    Ok(1) => format!("Item {} requeued", id),
                    Ok(_) => format!("Item {} not found", id),
                    Err(error) => {
                        log::error!("Failed to retry item {}: {:?}", id, error);
                        "Failed to requeue the item".to_string()
                    }
                },
                Err(_) => "Usage: /retry [confirm | <item_id>]".to_string(),
            },
        }
    }
}

impl Retry {
    pub fn command() -> &'static str {
        COMMAND
    }
}
