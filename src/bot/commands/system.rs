use super::Command;
use crate::db;
use crate::db::{channels, digests, discoveries, items, raw_messages, settings};
use crate::models::item::{STATUS_ERROR, STATUS_READY_PENDING, STATUS_REJECTED};
use chrono::Duration;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/system";

const HISTORY_LIMIT: i64 = 15;
const ERRORS_LIMIT: i64 = 10;

#[derive(TypedBuilder)]
pub struct System {
    args: String,
}

impl Command for System {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        match self.args.trim() {
            "errors" => self.errors(&mut connection),
            "history" => self.history(&mut connection),
            "" | "status" => self.status(&mut connection),
            "reasons" => self.drop_reasons(&mut connection),
            "clear_digest_errors" => match digests::clear_errors(&mut connection) {
                Ok(count) => format!("Cleared {} digest errors", count),
                Err(error) => {
                    log::error!("Failed to clear digest errors: {:?}", error);
                    "Failed to clear digest errors".to_string()
                }
            },
            _ => "Usage: /system [status | errors | history | reasons | clear_digest_errors]"
                .to_string(),
        }
    }
}

impl System {
    pub fn command() -> &'static str {
        COMMAND
    }

    fn status(&self, conn: &mut PgConnection) -> String {
        let unprocessed = raw_messages::count_unprocessed(conn).unwrap_or(0);
        let ready = items::count_by_status(conn, STATUS_READY_PENDING).unwrap_or(0);
        let failed = items::count_by_status(conn, STATUS_ERROR).unwrap_or(0);
        let rejected = items::count_by_status(conn, STATUS_REJECTED).unwrap_or(0);
        let channels = channels::count_active(conn).unwrap_or(0);
        let pending_discoveries = discoveries::count_pending(conn).unwrap_or(0);

        let last_digest = digests::last_posted(conn)
            .and_then(|digest| digest.posted_at)
            .map(|posted_at| posted_at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());

        format!(
            "Active channels: {}\nUnprocessed messages: {}\nReady items: {}\n\
             Failed items: {}\nRejected items: {}\nPending discoveries: {}\nLast digest: {}",
            channels, unprocessed, ready, failed, rejected, pending_discoveries, last_digest
        )
    }

    fn errors(&self, conn: &mut PgConnection) -> String {
        let failed = match items::failed(conn, ERRORS_LIMIT) {
            Ok(failed) => failed,
            Err(error) => {
                log::error!("Failed to load failed items: {:?}", error);
                return "Failed to load failed items".to_string();
            }
        };

        if failed.is_empty() {
            return "No failed items".to_string();
        }

        let mut lines = vec!["Recent failures (see /retry):".to_string()];

        for item in failed {
            let kind = item
                .error
                .as_ref()
                .and_then(|error| error.get("kind"))
                .and_then(|kind| kind.as_str())
                .unwrap_or("unknown");

            lines.push(format!("item {} — {}", item.id, kind));
        }

        lines.join("\n")
    }

    fn history(&self, conn: &mut PgConnection) -> String {
        let history = match settings::recent_history(conn, HISTORY_LIMIT) {
            Ok(history) => history,
            Err(error) => {
                log::error!("Failed to load setting history: {:?}", error);
                return "Failed to load setting history".to_string();
            }
        };

        if history.is_empty() {
            return "No settings have been changed yet".to_string();
        }

        let mut lines = vec!["Recent setting changes:".to_string()];

        for row in history {
            let new_value = row
                .new_value
                .map(|value| value.to_string())
                .unwrap_or_else(|| "(deleted)".to_string());

            lines.push(format!(
                "{} {} → {} (by {})",
                row.changed_at.format("%m-%d %H:%M"),
                row.key,
                new_value,
                row.changed_by
            ));
        }

        lines.join("\n")
    }

    fn drop_reasons(&self, conn: &mut PgConnection) -> String {
        let since = db::current_time() - Duration::days(7);

        let counts = match items::drop_reason_counts(conn, since) {
            Ok(counts) => counts,
            Err(error) => {
                log::error!("Failed to load drop reasons: {:?}", error);
                return "Failed to load drop reasons".to_string();
            }
        };

        if counts.is_empty() {
            return "Nothing was dropped in the last 7 days".to_string();
        }

        let mut lines = vec!["Drops in the last 7 days:".to_string()];

        for (reason, count) in counts {
            lines.push(format!("{}: {}", reason, count));
        }

        lines.join("\n")
    }
}
