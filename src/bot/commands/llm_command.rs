use super::Command;
use crate::config::Config;
use crate::db;
use crate::db::llm_usage;
use crate::db::settings;
use crate::llm::Task;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use serde_json::json;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/llm";

const USAGE: &str = "Usage: /llm costs | override <summarize|cluster|narrative|topic|score> \
<model> | budget <tokens, 0 disables>";

#[derive(TypedBuilder)]
pub struct LlmCommand {
    args: String,
}

impl Command for LlmCommand {
    fn response(&self, db_pool: Pool<ConnectionManager<PgConnection>>, message: &Message) -> String {
        let mut connection = match self.fetch_db_connection(db_pool) {
            Ok(connection) => connection,
            Err(error_message) => return error_message,
        };

        let changed_by = message.from.as_ref().map(|user| user.id as i64).unwrap_or(0);
        let mut parts = self.args.split_whitespace();

        match parts.next() {
            Some("costs") => self.costs(&mut connection),
            Some("override") => {
                let task = match parts.next().and_then(task_from_name) {
                    Some(task) => task,
                    None => return USAGE.to_string(),
                };

                let model = match parts.next() {
                    Some(model) => model,
                    None => return USAGE.to_string(),
                };

                match settings::save_with_history(
                    &mut connection,
                    task.override_key(),
                    json!(model),
                    changed_by,
                ) {
                    // The gateway re-reads overrides per call, so the change
                    // is already live.
                    Ok(_) => format!("{} now routes to {}", task.override_key(), model),
                    Err(error) => {
                        log::error!("Failed to save a model override: {:?}", error);
                        "Failed to save the override".to_string()
                    }
                }
            }
            Some("budget") => {
                let budget = match parts.next().and_then(|value| value.parse::<i64>().ok()) {
                    Some(budget) if budget >= 0 => budget,
                    _ => return USAGE.to_string(),
                };

                match settings::save_with_history(
                    &mut connection,
                    settings::LLM_DAILY_BUDGET,
                    json!(budget),
                    changed_by,
                ) {
                    Ok(_) => {
                        if budget == 0 {
                            "Daily token budget disabled".to_string()
                        } else {
                            format!("Daily token budget set to {}", budget)
                        }
                    }
                    Err(error) => {
                        log::error!("Failed to save the budget: {:?}", error);
                        "Failed to save the budget".to_string()
                    }
                }
            }
            _ => USAGE.to_string(),
        }
    }
}

impl LlmCommand {
    pub fn command() -> &'static str {
        COMMAND
    }

    fn costs(&self, conn: &mut PgConnection) -> String {
        let today = db::current_time().date_naive();

        let rows = match llm_usage::rows_for_day(conn, today) {
            Ok(rows) => rows,
            Err(error) => {
                log::error!("Failed to read llm usage: {:?}", error);
                return "Failed to read llm usage".to_string();
            }
        };

        if rows.is_empty() {
            return "No llm usage today".to_string();
        }

        let mut lines = vec![format!("LLM usage for {}:", today)];
        let mut total_tokens = 0;
        let mut total_cost = 0.0;

        for row in rows {
            total_tokens += row.total_tokens();
            total_cost += row.cost_usd;

            lines.push(format!(
                "{}/{}: {} requests, {} tokens, ${:.4}",
                row.provider,
                row.model,
                row.requests,
                row.total_tokens(),
                row.cost_usd
            ));
        }

        let budget = settings::get_i64(conn, settings::LLM_DAILY_BUDGET, Config::llm_daily_budget());

        if budget > 0 {
            lines.push(format!("Budget: {} / {} tokens", total_tokens, budget));
        }

        lines.push(format!("Total: {} tokens, ${:.4}", total_tokens, total_cost));

        lines.join("\n")
    }
}

fn task_from_name(name: &str) -> Option<Task> {
    match name {
        "summarize" => Some(Task::Summarize),
        "cluster" => Some(Task::Cluster),
        "narrative" => Some(Task::Narrative),
        "topic" => Some(Task::Topic),
        "score" => Some(Task::Score),
        _ => None,
    }
}
