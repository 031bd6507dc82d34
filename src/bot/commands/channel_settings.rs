use super::Command;
use crate::db::channels;
use crate::models::channel::WEIGHT_MODE_AUTO;
use crate::models::Channel;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/channel";

const USAGE: &str =
    "Usage: /channel <id> weight <0.1-2.0> | auto | delta <-1..1> | pause | resume";

#[derive(TypedBuilder)]
pub struct ChannelSettings {
    args: String,
}

impl Command for ChannelSettings {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let mut parts = self.args.split_whitespace();

        let channel = match parts.next().and_then(|id| id.parse::<i64>().ok()) {
            Some(id) => match channels::find(&mut connection, id) {
                Some(channel) => channel,
                None => return "Channel not found. See /list.".to_string(),
            },
            None => return USAGE.to_string(),
        };

        let action = parts.next().unwrap_or("");
        let value = parts.next();

        self.apply(&mut connection, &channel, action, value)
    }
}

impl ChannelSettings {
    pub fn command() -> &'static str {
        COMMAND
    }

    fn apply(
        &self,
        conn: &mut PgConnection,
        channel: &Channel,
        action: &str,
        value: Option<&str>,
    ) -> String {
        let result = match action {
            "weight" => match value.and_then(|weight| weight.parse::<f64>().ok()) {
                Some(weight) => channels::set_weight(conn, channel, weight)
                    .map(|channel| format!("Weight pinned to {:.2}", channel.importance_weight)),
                None => return USAGE.to_string(),
            },
            "auto" => channels::set_weight_mode(conn, channel, WEIGHT_MODE_AUTO)
                .map(|_| "Weight follows channel reliability again".to_string()),
            "delta" => match value.and_then(|delta| delta.parse::<f64>().ok()) {
                Some(delta) => channels::set_relevance_delta(conn, channel, Some(delta))
                    .map(|_| format!("Relevance delta set to {:+.2}", delta)),
                None => return USAGE.to_string(),
            },
            "pause" => {
                channels::set_active(conn, channel, false).map(|_| "Channel paused".to_string())
            }
            "resume" => {
                channels::set_active(conn, channel, true).map(|_| "Channel resumed".to_string())
            }
            "" => {
                return format!(
                    "{}: weight {:.2} ({}), delta {}, active {}",
                    channel.display_name(),
                    channel.importance_weight,
                    channel.weight_mode,
                    channel
                        .relevance_delta
                        .map(|delta| format!("{:+.2}", delta))
                        .unwrap_or_else(|| "none".to_string()),
                    channel.active
                )
            }
            _ => return USAGE.to_string(),
        };

        match result {
            Ok(response) => response,
            Err(error) => {
                log::error!("Failed to update channel {}: {:?}", channel.id, error);
                "Failed to update the channel".to_string()
            }
        }
    }
}
