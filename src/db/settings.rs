use crate::config::Config;
use crate::db;
use crate::models::{Setting, SettingHistory};
use crate::schema::{setting_history, settings};
use diesel::prelude::*;
use diesel::result::Error;
use serde_json::Value;

pub const RELEVANCE_THRESHOLD: &str = "relevance_threshold";
pub const IMPORTANCE_THRESHOLD: &str = "importance_threshold";
pub const DIGEST_SCHEDULE: &str = "digest_schedule";
pub const DIGEST_WINDOW_MINUTES: &str = "digest_window_minutes";
pub const DIGEST_ANCHOR: &str = "digest_anchor";
pub const DIGEST_CHANNEL_ID: &str = "digest_channel_id";
pub const DEDUP_MODE: &str = "dedup_mode";
pub const TOPICS_ENABLED: &str = "topics_enabled";
pub const EDITOR_ENABLED: &str = "editor_enabled";
pub const CONSOLIDATED_CLUSTERS_ENABLED: &str = "consolidated_clusters_enabled";
pub const DIGEST_AI_COVER: &str = "digest_ai_cover";
pub const DIGEST_INLINE_IMAGES: &str = "digest_inline_images";
pub const SKIP_FORWARDS: &str = "skip_forwards";
pub const MIN_LENGTH: &str = "min_length";
pub const KEYWORD_MODE: &str = "keyword_mode";
pub const ALLOW_KEYWORDS: &str = "allow_keywords";
pub const DENY_KEYWORDS: &str = "deny_keywords";
pub const ADS_FILTER_ENABLED: &str = "ads_filter_enabled";
pub const AUTO_RELEVANCE_ENABLED: &str = "auto_relevance_enabled";
pub const LLM_DAILY_BUDGET: &str = "llm_daily_budget";
pub const ADMIN_IDS: &str = "admin_ids";

pub fn get(conn: &mut PgConnection, key: &str) -> Option<Value> {
    settings::table
        .filter(settings::key.eq(key))
        .first::<Setting>(conn)
        .ok()
        .map(|setting| setting.value)
}

// The mutation and its audit row commit together. The row lock serializes
// concurrent writers per key.
pub fn save_with_history(
    conn: &mut PgConnection,
    key: &str,
    value: Value,
    changed_by: i64,
) -> Result<Setting, Error> {
    conn.transaction::<Setting, Error, _>(|conn| {
        let old_value = settings::table
            .filter(settings::key.eq(key))
            .for_update()
            .first::<Setting>(conn)
            .optional()?
            .map(|setting| setting.value);

        let setting = diesel::insert_into(settings::table)
            .values((
                settings::key.eq(key),
                settings::value.eq(value.clone()),
                settings::updated_at.eq(db::current_time()),
            ))
            .on_conflict(settings::key)
            .do_update()
            .set((
                settings::value.eq(value.clone()),
                settings::updated_at.eq(db::current_time()),
            ))
            .get_result::<Setting>(conn)?;

        diesel::insert_into(setting_history::table)
            .values((
                setting_history::key.eq(key),
                setting_history::old_value.eq(old_value),
                setting_history::new_value.eq(value.clone()),
                setting_history::changed_by.eq(changed_by),
                setting_history::changed_at.eq(db::current_time()),
            ))
            .execute(conn)?;

        Ok(setting)
    })
}

// Deletion leaves a tombstone row so the audit trail replays to the current
// state. Reads fall back to config defaults afterwards.
pub fn delete_with_history(
    conn: &mut PgConnection,
    key: &str,
    changed_by: i64,
) -> Result<usize, Error> {
    conn.transaction::<usize, Error, _>(|conn| {
        let old_value = settings::table
            .filter(settings::key.eq(key))
            .for_update()
            .first::<Setting>(conn)
            .optional()?
            .map(|setting| setting.value);

        if old_value.is_none() {
            return Ok(0);
        }

        let deleted =
            diesel::delete(settings::table.filter(settings::key.eq(key))).execute(conn)?;

        let new_value: Option<Value> = None;

        diesel::insert_into(setting_history::table)
            .values((
                setting_history::key.eq(key),
                setting_history::old_value.eq(old_value),
                setting_history::new_value.eq(new_value),
                setting_history::changed_by.eq(changed_by),
                setting_history::changed_at.eq(db::current_time()),
            ))
            .execute(conn)?;

        Ok(deleted)
    })
}

pub fn recent_history(conn: &mut PgConnection, count: i64) -> Result<Vec<SettingHistory>, Error> {
    setting_history::table
        .order(setting_history::changed_at.desc())
        .limit(count)
        .load::<SettingHistory>(conn)
}

pub fn get_f64(conn: &mut PgConnection, key: &str, default: f64) -> f64 {
    get(conn, key)
        .and_then(|value| value.as_f64())
        .unwrap_or(default)
}

pub fn get_i64(conn: &mut PgConnection, key: &str, default: i64) -> i64 {
    get(conn, key)
        .and_then(|value| value.as_i64())
        .unwrap_or(default)
}

pub fn get_bool(conn: &mut PgConnection, key: &str, default: bool) -> bool {
    get(conn, key)
        .and_then(|value| value.as_bool())
        .unwrap_or(default)
}

pub fn get_string(conn: &mut PgConnection, key: &str, default: &str) -> String {
    get(conn, key)
        .and_then(|value| value.as_str().map(|string| string.to_string()))
        .unwrap_or_else(|| default.to_string())
}

pub fn get_string_list(conn: &mut PgConnection, key: &str) -> Vec<String> {
    get(conn, key)
        .and_then(|value| {
            value.as_array().map(|values| {
                values
                    .iter()
                    .filter_map(|value| value.as_str().map(|string| string.to_string()))
                    .collect()
            })
        })
        .unwrap_or_default()
}

// Static config admins plus whatever operators added at runtime.
pub fn admin_ids(conn: &mut PgConnection) -> Vec<i64> {
    let mut ids = Config::admin_ids();

    if let Some(value) = get(conn, ADMIN_IDS) {
        if let Some(values) = value.as_array() {
            for value in values {
                if let Some(id) = value.as_i64() {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
    }

    ids
}

pub fn relevance_threshold(conn: &mut PgConnection) -> f64 {
    get_f64(conn, RELEVANCE_THRESHOLD, Config::relevance_threshold())
}

pub fn importance_threshold(conn: &mut PgConnection) -> f64 {
    get_f64(conn, IMPORTANCE_THRESHOLD, Config::importance_threshold())
}

pub fn digest_window_minutes(conn: &mut PgConnection) -> i64 {
    get_i64(conn, DIGEST_WINDOW_MINUTES, Config::digest_window_minutes())
}

pub fn digest_channel_id(conn: &mut PgConnection) -> Option<i64> {
    get(conn, DIGEST_CHANNEL_ID)
        .and_then(|value| value.as_i64())
        .or_else(Config::digest_channel_id)
}

#[cfg(test)]
mod tests {
    use crate::db;
    use diesel::result::Error;
    use diesel::Connection;
    use serde_json::json;

    #[test]
    fn save_with_history_records_old_and_new_values() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            super::save_with_history(connection, "relevance_threshold", json!(0.5), 42).unwrap();
            super::save_with_history(connection, "relevance_threshold", json!(0.7), 42).unwrap();

            let history = super::recent_history(connection, 10).unwrap();

            assert_eq!(history.len(), 2);
            assert_eq!(history[0].old_value, Some(json!(0.5)));
            assert_eq!(history[0].new_value, Some(json!(0.7)));
            assert_eq!(history[1].old_value, None);
            assert_eq!(history[1].new_value, Some(json!(0.5)));

            assert_eq!(super::get(connection, "relevance_threshold"), Some(json!(0.7)));

            Ok(())
        });
    }

    #[test]
    fn replaying_history_yields_current_value() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            for value in [json!(1), json!(2), json!(3)] {
                super::save_with_history(connection, "min_length", value, 1).unwrap();
            }

            let mut history = super::recent_history(connection, 10).unwrap();
            history.reverse();

            let replayed = history
                .into_iter()
                .filter(|row| row.key == "min_length")
                .fold(None, |_, row| row.new_value);

            assert_eq!(replayed, super::get(connection, "min_length"));

            Ok(())
        });
    }

    #[test]
    fn delete_with_history_leaves_a_tombstone() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            super::save_with_history(connection, "topics_enabled", json!(true), 7).unwrap();
            let deleted = super::delete_with_history(connection, "topics_enabled", 7).unwrap();

            assert_eq!(deleted, 1);
            assert_eq!(super::get(connection, "topics_enabled"), None);

            let history = super::recent_history(connection, 10).unwrap();
            assert_eq!(history[0].old_value, Some(json!(true)));
            assert_eq!(history[0].new_value, None);

            Ok(())
        });
    }

    #[test]
    fn delete_with_history_without_value_is_a_no_op() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let deleted = super::delete_with_history(connection, "missing", 7).unwrap();

            assert_eq!(deleted, 0);
            assert!(super::recent_history(connection, 10).unwrap().is_empty());

            Ok(())
        });
    }

    #[test]
    fn typed_getters_fall_back_to_defaults() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            assert_eq!(super::get_f64(connection, "missing", 0.4), 0.4);
            assert!(super::get_bool(connection, "missing", true));
            assert_eq!(super::get_i64(connection, "missing", 9), 9);

            super::save_with_history(connection, "min_length", json!(120), 1).unwrap();
            assert_eq!(super::get_i64(connection, "min_length", 9), 120);

            Ok(())
        });
    }
}
