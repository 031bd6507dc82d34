use super::Command;
use crate::db;
use crate::digest;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/digest";

#[derive(TypedBuilder)]
pub struct DigestNow {
    args: String,
}

impl Command for DigestNow {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        if self.args.trim() == "preview" {
            return self.preview(db_pool);
        }

        match digest::run_window(db::current_time()) {
            Ok(true) => "Digest posted".to_string(),
            Ok(false) => "No ready items in the current window, nothing posted".to_string(),
            Err(error) => {
                log::error!("Manual digest failed: {}", error.msg);
                format!("Digest failed: {}", error.msg)
            }
        }
    }
}

impl DigestNow {
    pub fn command() -> &'static str {
        COMMAND
    }

    fn preview(&self, db_pool: Pool<ConnectionManager<PgConnection>>) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let end = db::current_time();
        let window_minutes = db::settings::digest_window_minutes(&mut connection);
        let start = end - chrono::Duration::minutes(window_minutes.max(1));

        match digest::builder::build(&mut connection, start, end) {
            Ok(Some(plan)) => format!(
                "Window [{} .. {}]: {} clusters over {} items, topics: {}",
                start.format("%H:%M"),
                end.format("%H:%M"),
                plan.clusters.len(),
                plan.included_item_ids().len(),
                if plan.topics().is_empty() {
                    "none".to_string()
                } else {
                    plan.topics().join(", ")
                }
            ),
            Ok(None) => "The current window has no ready items".to_string(),
            Err(error) => {
                log::error!("Digest preview failed: {}", error.msg);
                "Digest preview failed".to_string()
            }
        }
    }
}
