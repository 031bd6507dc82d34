use super::Command;
use crate::db::channels;
use crate::db::channels::NewChannel;
use crate::reader::discovery;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/add";

#[derive(TypedBuilder)]
pub struct AddChannel {
    args: String,
}

impl Command for AddChannel {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        let reference = self.args.trim();

        if reference.is_empty() {
            return "Usage: /add <@username|https://t.me/channel|invite link>".to_string();
        }

        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        self.add_channel(&mut connection, reference)
    }
}

impl AddChannel {
    pub fn command() -> &'static str {
        COMMAND
    }

    fn add_channel(&self, conn: &mut PgConnection, reference: &str) -> String {
        // Invite links are joined later by the reader.
        if let Some(invite_hash) = discovery::invite_hash_from_url(reference) {
            let new_channel = NewChannel {
                invite_link: Some(format!("https://t.me/+{}", invite_hash)),
                ..Default::default()
            };

            return match channels::create(conn, new_channel) {
                Ok(channel) => format!("Added invite-only channel with id {}", channel.id),
                Err(error) => {
                    log::error!("Failed to add a channel: {:?}", error);
                    "Failed to add the channel".to_string()
                }
            };
        }

        let username = discovery::username_from_tme_url(reference)
            .or_else(|| {
                let trimmed = reference.trim_start_matches('@');

                (!trimmed.is_empty() && !trimmed.contains('/'))
                    .then(|| trimmed.to_lowercase())
            });

        match username {
            Some(username) => match channels::create_by_username(conn, &username) {
                Ok(channel) => format!(
                    "Tracking @{} (id {}). The reader picks it up on the next cycle.",
                    username, channel.id
                ),
                Err(error) => {
                    log::error!("Failed to add a channel: {:?}", error);
                    "Failed to add the channel".to_string()
                }
            },
            None => "That does not look like a channel username or link".to_string(),
        }
    }
}
