use super::Command;
use crate::db::channels;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/remove";

#[derive(TypedBuilder)]
pub struct RemoveChannel {
    args: String,
}

impl Command for RemoveChannel {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let reference = self.args.trim();

        let channel = match reference.parse::<i64>() {
            Ok(id) => channels::find(&mut connection, id),
            Err(_) => channels::find_by_username(&mut connection, reference),
        };

        let channel = match channel {
            Some(channel) => channel,
            None => return "Channel not found. See /list for tracked channels.".to_string(),
        };

        match channels::remove(&mut connection, channel.id) {
            Ok(_) => format!("Removed {}", channel.display_name()),
            Err(error) => {
                log::error!("Failed to remove channel {}: {:?}", channel.id, error);
                "Failed to remove the channel".to_string()
            }
        }
    }
}

impl RemoveChannel {
    pub fn command() -> &'static str {
        COMMAND
    }
}
