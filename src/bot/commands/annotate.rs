use super::Command;
use crate::db;
use crate::db::{annotations, items};
use chrono::Duration;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/annotate";

const USAGE: &str = "Usage: /annotate enqueue [hours] [limit] | assign | label <label> [comment] | skip";

const DEFAULT_HOURS: i64 = 24;
const DEFAULT_LIMIT: i64 = 50;

#[derive(TypedBuilder)]
pub struct Annotate {
    args: String,
}

impl Command for Annotate {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let user_id = match message.from.as_ref() {
            Some(user) => user.id as i64,
            None => return "Annotation needs a user".to_string(),
        };

        let mut parts = self.args.split_whitespace();

        match parts.next() {
            Some("enqueue") => {
                let hours = parts
                    .next()
                    .and_then(|hours| hours.parse::<i64>().ok())
                    .unwrap_or(DEFAULT_HOURS);
                let limit = parts
                    .next()
                    .and_then(|limit| limit.parse::<i64>().ok())
                    .unwrap_or(DEFAULT_LIMIT);

                let since = db::current_time() - Duration::hours(hours.max(1));

                match annotations::enqueue(&mut connection, since, limit.max(1)) {
                    Ok(queued) => format!(
                        "Queued {} items, {} waiting for labels",
                        queued,
                        annotations::count_unlabeled(&mut connection).unwrap_or(0)
                    ),
                    Err(error) => {
                        log::error!("Failed to enqueue annotations: {:?}", error);
                        "Failed to enqueue items".to_string()
                    }
                }
            }

            Some("assign") => match annotations::assign(&mut connection, user_id) {
                Ok(Some(annotation)) => {
                    let summary = items::find(&mut connection, annotation.item_id)
                        .map(|item| item.summary)
                        .unwrap_or_default();

                    format!(
                        "Item {} assigned to you:\n{}\n\nReply with /annotate label <good|bad|irrelevant> [comment] or /annotate skip",
                        annotation.item_id, summary
                    )
                }
                Ok(None) => "The annotation queue is empty".to_string(),
                Err(error) => {
                    log::error!("Failed to assign an annotation: {:?}", error);
                    "Failed to assign an item".to_string()
                }
            },

            Some("label") => {
                let label = match parts.next() {
                    Some(label) => label.to_string(),
                    None => return USAGE.to_string(),
                };

                let comment = {
                    let rest = parts.collect::<Vec<&str>>().join(" ");
                    (!rest.is_empty()).then_some(rest)
                };

                match annotations::label(&mut connection, user_id, &label, comment) {
                    Ok(Some(annotation)) => {
                        format!("Item {} labeled {}", annotation.item_id, label)
                    }
                    Ok(None) => "You have no assigned item; use /annotate assign".to_string(),
                    Err(error) => {
                        log::error!("Failed to label an annotation: {:?}", error);
                        "Failed to save the label".to_string()
                    }
                }
            }

            Some("skip") => match annotations::skip(&mut connection, user_id) {
                Ok(1) => "Skipped; the item goes back to the queue".to_string(),
                Ok(_) => "You have no assigned item".to_string(),
                Err(error) => {
                    log::error!("Failed to skip an annotation: {:?}", error);
                    "Failed to skip".to_string()
                }
            },

            _ => USAGE.to_string(),
        }
    }
}

impl Annotate {
    pub fn command() -> &'static str {
        COMMAND
    }
}
