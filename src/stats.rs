use crate::schema::{item_ratings, items, raw_messages};
use chrono::{DateTime, Duration, Utc};
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::result::Error;
use diesel::sql_types::{Double, Nullable};

pub mod auto_weight_job;

pub use auto_weight_job::AutoWeightJob;

pub const JOB_TYPE: &str = "stats";

const WINDOW_DAYS: i64 = 7;
const RELIABILITY_HALF_LIFE_DAYS: f64 = 7.0;

// Without any ratings a channel is neither trusted nor distrusted.
const NEUTRAL_RELIABILITY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub channel_id: i64,
    pub raw_count: i64,
    pub ready_count: i64,
    pub conversion: f64,
    pub relevance_mean: f64,
    pub relevance_stddev: f64,
    pub importance_mean: f64,
    pub importance_stddev: f64,
    pub reliability: f64,
}

pub fn channel_stats(conn: &mut PgConnection, channel_id: i64) -> Result<ChannelStats, Error> {
    let cutoff = crate::db::current_time() - Duration::days(WINDOW_DAYS);

    let raw_count = raw_messages::table
        .filter(raw_messages::channel_id.eq(channel_id))
        .filter(raw_messages::created_at.ge(cutoff))
        .count()
        .first::<i64>(conn)?;

    let ready_count = items::table
        .filter(items::channel_id.eq(channel_id))
        .filter(items::created_at.ge(cutoff))
        .filter(items::status.eq_any(vec!["ready_pending", "ready_digested"]))
        .count()
        .first::<i64>(conn)?;

    let (relevance_mean, relevance_stddev, importance_mean, importance_stddev) = items::table
        .filter(items::channel_id.eq(channel_id))
        .filter(items::created_at.ge(cutoff))
        .select((
            sql::<Nullable<Double>>("avg(relevance)"),
            sql::<Nullable<Double>>("stddev_pop(relevance)"),
            sql::<Nullable<Double>>("avg(importance)"),
            sql::<Nullable<Double>>("stddev_pop(importance)"),
        ))
        .first::<(Option<f64>, Option<f64>, Option<f64>, Option<f64>)>(conn)
        .map(|(relevance_mean, relevance_stddev, importance_mean, importance_stddev)| {
            (
                relevance_mean.unwrap_or(0.0),
                relevance_stddev.unwrap_or(0.0),
                importance_mean.unwrap_or(0.0),
                importance_stddev.unwrap_or(0.0),
            )
        })?;

    let ratings = item_ratings::table
        .inner_join(items::table)
        .filter(items::channel_id.eq(channel_id))
        .select((item_ratings::value, item_ratings::updated_at))
        .load::<(String, DateTime<Utc>)>(conn)?;

    let conversion = if raw_count > 0 {
        ready_count as f64 / raw_count as f64
    } else {
        0.0
    };

    Ok(ChannelStats {
        channel_id,
        raw_count,
        ready_count,
        conversion,
        relevance_mean,
        relevance_stddev,
        importance_mean,
        importance_stddev,
        reliability: decayed_reliability(&ratings, crate::db::current_time()),
    })
}

// weighted_good / weighted_total, each vote decaying with age so a channel
// cannot coast on ancient praise.
pub fn decayed_reliability(ratings: &[(String, DateTime<Utc>)], now: DateTime<Utc>) -> f64 {
    let mut weighted_good = 0.0;
    let mut weighted_total = 0.0;

    for (value, rated_at) in ratings {
        let age_days = (now - *rated_at).num_seconds() as f64 / 86_400.0;
        let weight = 0.5_f64.powf(age_days.max(0.0) / RELIABILITY_HALF_LIFE_DAYS);

        weighted_total += weight;

        if value == "good" {
            weighted_good += weight;
        }
    }

    if weighted_total == 0.0 {
        return NEUTRAL_RELIABILITY;
    }

    weighted_good / weighted_total
}

#[cfg(test)]
mod tests {
    use super::decayed_reliability;
    use chrono::{Duration, Utc};

    #[test]
    fn no_ratings_is_neutral() {
        assert_eq!(decayed_reliability(&[], Utc::now()), 0.5);
    }

    #[test]
    fn fresh_ratings_dominate_old_ones() {
        let now = Utc::now();

        let ratings = vec![
            ("good".to_string(), now),
            ("bad".to_string(), now - Duration::days(70)),
        ];

        let reliability = decayed_reliability(&ratings, now);

        assert!(reliability > 0.95);
    }

    #[test]
    fn equal_fresh_ratings_split_evenly() {
        let now = Utc::now();

        let ratings = vec![
            ("good".to_string(), now),
            ("irrelevant".to_string(), now),
        ];

        assert!((decayed_reliability(&ratings, now) - 0.5).abs() < 1e-9);
    }
}
