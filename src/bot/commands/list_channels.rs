use super::Command;
use crate::db::channels;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/list";

#[derive(TypedBuilder)]
pub struct ListChannels {}

impl Command for ListChannels {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let channels = match channels::all(&mut connection) {
            Ok(channels) => channels,
            Err(error) => {
                log::error!("Failed to list channels: {:?}", error);
                return "Failed to list channels".to_string();
            }
        };

        if channels.is_empty() {
            return "No channels are tracked yet. Add one with /add.".to_string();
        }

        let mut lines = vec![];

        for channel in channels {
            let state = if !channel.active {
                " [paused]"
            } else if channel.error.is_some() {
                " [failing]"
            } else {
                ""
            };

            lines.push(format!(
                "{} — {} (weight {:.2}, {}){}",
                channel.id,
                channel.display_name(),
                channel.importance_weight,
                channel.weight_mode,
                state
            ));
        }

        lines.join("\n")
    }
}

impl ListChannels {
    pub fn command() -> &'static str {
        COMMAND
    }
}
