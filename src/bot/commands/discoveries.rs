use super::Command;
use crate::db::channels;
use crate::db::channels::NewChannel;
use crate::db::discoveries;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/discoveries";

const LIST_LIMIT: i64 = 15;

#[derive(TypedBuilder)]
pub struct Discoveries {
    args: String,
}

impl Command for Discoveries {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let mut parts = self.args.split_whitespace();

        match (parts.next(), parts.next().and_then(|id| id.parse::<i64>().ok())) {
            (Some("approve"), Some(id)) => self.approve(&mut connection, id),
            (Some("reject"), Some(id)) => self.reject(&mut connection, id),
            (None, _) => self.list(&mut connection),
            _ => "Usage: /discoveries [approve <id> | reject <id>]".to_string(),
        }
    }
}

impl Discoveries {
    pub fn command() -> &'static str {
        COMMAND
    }

    fn list(&self, conn: &mut PgConnection) -> String {
        let pending = match discoveries::list_pending(conn, LIST_LIMIT) {
            Ok(pending) => pending,
            Err(error) => {
                log::error!("Failed to list discoveries: {:?}", error);
                return "Failed to list discoveries".to_string();
            }
        };

        if pending.is_empty() {
            return "No pending discoveries".to_string();
        }

        let mut lines = vec!["Pending channel candidates:".to_string()];

        for discovery in pending {
            lines.push(format!(
                "{} — {} ({} sightings, engagement {}, via {})",
                discovery.id,
                discovery.display_name(),
                discovery.discovery_count,
                discovery.engagement,
                discovery.source_type
            ));
        }

        lines.join("\n")
    }

    // Approving starts tracking the channel right away.
    fn approve(&self, conn: &mut PgConnection, id: i64) -> String {
        let discovery = match discoveries::approve(conn, id) {
            Ok(Some(discovery)) => discovery,
            Ok(None) => return "Discovery is already settled".to_string(),
            Err(error) => {
                log::error!("Failed to approve discovery {}: {:?}", id, error);
                return "Failed to approve the discovery".to_string();
            }
        };

        let new_channel = NewChannel {
            username: discovery.username.clone(),
            peer_id: discovery.username.is_none().then_some(discovery.peer_id).flatten(),
            invite_link: discovery
                .invite_hash
                .as_ref()
                .map(|hash| format!("https://t.me/+{}", hash)),
            title: discovery.title.clone(),
            ..Default::default()
        };

        match channels::create(conn, new_channel) {
            Ok(channel) => format!(
                "Approved {} and started tracking it as channel {}",
                discovery.display_name(),
                channel.id
            ),
            Err(error) => {
                log::error!("Failed to create a channel from discovery {}: {:?}", id, error);
                format!(
                    "Approved {}, but tracking it failed; add it manually with /add",
                    discovery.display_name()
                )
            }
        }
    }

    fn reject(&self, conn: &mut PgConnection, id: i64) -> String {
        match discoveries::reject(conn, id) {
            Ok(Some(discovery)) => format!("Rejected {}", discovery.display_name()),
            Ok(None) => "Discovery is already settled".to_string(),
            Err(error) => {
                log::error!("Failed to reject discovery {}: {:?}", id, error);
                "Failed to reject the discovery".to_string()
            }
        }
    }
}
