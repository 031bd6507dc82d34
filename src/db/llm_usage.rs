use crate::db;
use crate::models::LlmUsage;
use crate::schema::llm_usage;
use chrono::NaiveDate;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::result::Error;
use diesel::sql_types::{BigInt, Nullable};

pub fn record(
    conn: &mut PgConnection,
    day: NaiveDate,
    provider: &str,
    model: &str,
    prompt_tokens: i64,
    completion_tokens: i64,
    cost_usd: f64,
) -> Result<LlmUsage, Error> {
    diesel::insert_into(llm_usage::table)
        .values((
            llm_usage::day.eq(day),
            llm_usage::provider.eq(provider),
            llm_usage::model.eq(model),
            llm_usage::requests.eq(1),
            llm_usage::prompt_tokens.eq(prompt_tokens),
            llm_usage::completion_tokens.eq(completion_tokens),
            llm_usage::cost_usd.eq(cost_usd),
        ))
        .on_conflict((llm_usage::day, llm_usage::provider, llm_usage::model))
        .do_update()
        .set((
            llm_usage::requests.eq(llm_usage::requests + 1),
            llm_usage::prompt_tokens.eq(llm_usage::prompt_tokens + prompt_tokens),
            llm_usage::completion_tokens.eq(llm_usage::completion_tokens + completion_tokens),
            llm_usage::cost_usd.eq(llm_usage::cost_usd + cost_usd),
            llm_usage::updated_at.eq(db::current_time()),
        ))
        .get_result::<LlmUsage>(conn)
}

pub fn tokens_for_day(conn: &mut PgConnection, day: NaiveDate) -> Result<i64, Error> {
    let prompt = llm_usage::table
        .filter(llm_usage::day.eq(day))
        .select(sql::<Nullable<BigInt>>("sum(prompt_tokens)::bigint"))
        .first::<Option<i64>>(conn)?
        .unwrap_or(0);

    let completion = llm_usage::table
        .filter(llm_usage::day.eq(day))
        .select(sql::<Nullable<BigInt>>("sum(completion_tokens)::bigint"))
        .first::<Option<i64>>(conn)?
        .unwrap_or(0);

    Ok(prompt + completion)
}

pub fn rows_for_day(conn: &mut PgConnection, day: NaiveDate) -> Result<Vec<LlmUsage>, Error> {
    llm_usage::table
        .filter(llm_usage::day.eq(day))
        .order((llm_usage::provider, llm_usage::model))
        .load::<LlmUsage>(conn)
}

pub fn recent(conn: &mut PgConnection, count: i64) -> Result<Vec<LlmUsage>, Error> {
    llm_usage::table
        .order((llm_usage::day.desc(), llm_usage::provider))
        .limit(count)
        .load::<LlmUsage>(conn)
}

#[cfg(test)]
mod tests {
    use crate::db;
    use chrono::NaiveDate;
    use diesel::result::Error;
    use diesel::Connection;

    #[test]
    fn record_accumulates_per_day_provider_model() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

            super::record(connection, day, "google", "gemini-1.5-flash", 100, 20, 0.001).unwrap();
            let usage =
                super::record(connection, day, "google", "gemini-1.5-flash", 50, 10, 0.0005)
                    .unwrap();

            assert_eq!(usage.requests, 2);
            assert_eq!(usage.prompt_tokens, 150);
            assert_eq!(usage.completion_tokens, 30);

            assert_eq!(super::tokens_for_day(connection, day).unwrap(), 180);

            Ok(())
        });
    }
}
