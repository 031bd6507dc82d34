use super::Command;
use crate::db;
use crate::db::settings;
use crate::digest::schedule::Schedule;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use serde_json::json;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/schedule";

const USAGE: &str = "Usage: /schedule [set <json> | window <minutes>]\n\
Example: /schedule set {\"timezone\":\"Europe/Kyiv\",\
\"weekdays\":{\"times\":[\"09:00\",\"18:00\"]},\"weekends\":{\"hourly\":\"10:00-18:00\"}}";

#[derive(TypedBuilder)]
pub struct ScheduleCommand {
    args: String,
}

impl Command for ScheduleCommand {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let changed_by = message.from.as_ref().map(|user| user.id as i64).unwrap_or(0);
        let trimmed = self.args.trim();

        if trimmed.is_empty() {
            return self.show(&mut connection);
        }

        if let Some(minutes) = trimmed.strip_prefix("window") {
            return self.set_window(&mut connection, minutes.trim(), changed_by);
        }

        if let Some(json_text) = trimmed.strip_prefix("set") {
            return self.set_schedule(&mut connection, json_text.trim(), changed_by);
        }

        USAGE.to_string()
    }
}

impl ScheduleCommand {
    pub fn command() -> &'static str {
        COMMAND
    }

    fn show(&self, conn: &mut PgConnection) -> String {
        let now = db::current_time();

        let schedule = settings::get(conn, settings::DIGEST_SCHEDULE)
            .and_then(|value| Schedule::parse(&value).ok());

        match schedule {
            Some(schedule) => {
                let upcoming = schedule
                    .next_times(now, 3)
                    .into_iter()
                    .map(|fire| {
                        fire.with_timezone(&schedule.timezone)
                            .format("%a %H:%M %Z")
                            .to_string()
                    })
                    .collect::<Vec<String>>()
                    .join(", ");

                format!("Schedule active. Next fires: {}", upcoming)
            }
            None => {
                let window = settings::digest_window_minutes(conn);

                format!(
                    "No schedule set; the digest fires every {} minutes. {}",
                    window, USAGE
                )
            }
        }
    }

    fn set_window(&self, conn: &mut PgConnection, minutes: &str, changed_by: i64) -> String {
        let minutes = match minutes.parse::<i64>() {
            Ok(minutes) if minutes > 0 => minutes,
            _ => return USAGE.to_string(),
        };

        let saved = settings::save_with_history(
            conn,
            settings::DIGEST_WINDOW_MINUTES,
            json!(minutes),
            changed_by,
        )
        .and_then(|_| {
            // The anchor makes the fallback cadence deterministic across
            // restarts.
            settings::save_with_history(
                conn,
                settings::DIGEST_ANCHOR,
                json!(db::current_time().to_rfc3339()),
                changed_by,
            )
        });

        match saved {
            Ok(_) => format!("Digest window set to {} minutes", minutes),
            Err(error) => {
                log::error!("Failed to save the digest window: {:?}", error);
                "Failed to save the digest window".to_string()
            }
        }
    }

    fn set_schedule(&self, conn: &mut PgConnection, json_text: &str, changed_by: i64) -> String {
        let value: serde_json::Value = match serde_json::from_str(json_text) {
            Ok(value) => value,
            Err(error) => return format!("Invalid json: {}. {}", error, USAGE),
        };

        if let Err(error) = Schedule::parse(&value) {
            return format!("Invalid schedule: {}", error.msg);
        }

        let saved =
            settings::save_with_history(conn, settings::DIGEST_SCHEDULE, value, changed_by)
                .and_then(|_| {
                    settings::save_with_history(
                        conn,
                        settings::DIGEST_ANCHOR,
                        json!(db::current_time().to_rfc3339()),
                        changed_by,
                    )
                });

        match saved {
            Ok(_) => self.show(conn),
            Err(error) => {
                log::error!("Failed to save the schedule: {:?}", error);
                "Failed to save the schedule".to_string()
            }
        }
    }
}
