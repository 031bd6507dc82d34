use super::LlmError;
use crate::config::Config;
use crate::db::{llm_usage, settings};
use chrono::Utc;
use diesel::PgConnection;

const WARNING_SHARE: f64 = 0.8;

// Daily prompt+completion token cap. Zero disables the budget entirely.
pub fn check(conn: &mut PgConnection) -> Result<(), LlmError> {
    let budget = settings::get_i64(conn, settings::LLM_DAILY_BUDGET, Config::llm_daily_budget());

    if budget <= 0 {
        return Ok(());
    }

    let today = Utc::now().date_naive();
    let spent = match llm_usage::tokens_for_day(conn, today) {
        Ok(spent) => spent,
        Err(error) => {
            // A failed read never blocks the pipeline.
            log::error!("Failed to read llm usage: {:?}", error);
            return Ok(());
        }
    };

    if spent >= budget {
        log::error!("Daily llm token budget exhausted: {} / {}", spent, budget);
        return Err(LlmError::BudgetExceeded);
    }

    if (spent as f64) >= (budget as f64) * WARNING_SHARE {
        log::warn!("Daily llm token budget at {} / {}", spent, budget);
    }

    Ok(())
}

pub fn record(
    conn: &mut PgConnection,
    provider: &str,
    model: &str,
    prompt_tokens: i64,
    completion_tokens: i64,
) {
    let today = Utc::now().date_naive();
    let cost = super::usage::cost_usd(model, prompt_tokens, completion_tokens);

    if let Err(error) = llm_usage::record(
        conn,
        today,
        provider,
        model,
        prompt_tokens,
        completion_tokens,
        cost,
    ) {
        log::error!("Failed to record llm usage: {:?}", error);
    }
}
