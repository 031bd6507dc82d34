use crate::db;
use crate::models::item::{
    STATUS_ERROR, STATUS_PENDING, STATUS_READY_DIGESTED, STATUS_READY_PENDING, STATUS_REJECTED,
};
use crate::models::{Channel, Item, RawMessage};
use crate::schema::{channels, items, raw_messages};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::result::Error;
use serde_json::Value;

#[derive(Insertable, Debug)]
#[diesel(table_name = items)]
pub struct NewItem {
    pub raw_id: i64,
    pub channel_id: i64,
    pub summary: String,
    pub topic: Option<String>,
    pub relevance: f64,
    pub importance: f64,
    pub status: String,
    pub error: Option<Value>,
    pub drop_reason: Option<String>,
    pub content_hash: String,
    pub tg_date: DateTime<Utc>,
}

// A raw message projects into at most one item. A concurrent second attempt
// hits the raw_id conflict and backs off.
pub fn create(conn: &mut PgConnection, new_item: NewItem) -> Result<Option<Item>, Error> {
    diesel::insert_into(items::table)
        .values(new_item)
        .on_conflict_do_nothing()
        .get_result::<Item>(conn)
        .optional()
}

// Applies a processing outcome to an item that went through an explicit
// retry. Terminal items are left alone.
pub fn update_outcome(conn: &mut PgConnection, id: i64, outcome: &NewItem) -> Result<usize, Error> {
    diesel::update(
        items::table
            .filter(items::id.eq(id))
            .filter(items::status.eq(STATUS_PENDING)),
    )
    .set((
        items::summary.eq(outcome.summary.clone()),
        items::topic.eq(outcome.topic.clone()),
        items::relevance.eq(outcome.relevance),
        items::importance.eq(outcome.importance),
        items::status.eq(outcome.status.clone()),
        items::error.eq(outcome.error.clone()),
        items::drop_reason.eq(outcome.drop_reason.clone()),
        items::updated_at.eq(db::current_time()),
    ))
    .execute(conn)
}

pub fn find(conn: &mut PgConnection, id: i64) -> Option<Item> {
    items::table
        .filter(items::id.eq(id))
        .first::<Item>(conn)
        .ok()
}

pub fn find_by_raw_id(conn: &mut PgConnection, raw_id: i64) -> Option<Item> {
    items::table
        .filter(items::raw_id.eq(raw_id))
        .first::<Item>(conn)
        .ok()
}

pub fn ready_pending_in_window(
    conn: &mut PgConnection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<(Item, Channel, RawMessage)>, Error> {
    items::table
        .inner_join(channels::table)
        .inner_join(raw_messages::table)
        .filter(items::status.eq(STATUS_READY_PENDING))
        .filter(items::tg_date.ge(start))
        .filter(items::tg_date.le(end))
        .order(items::id)
        .load::<(Item, Channel, RawMessage)>(conn)
}

pub fn mark_digested(conn: &mut PgConnection, ids: &[i64]) -> Result<usize, Error> {
    diesel::update(
        items::table
            .filter(items::id.eq_any(ids))
            .filter(items::status.eq(STATUS_READY_PENDING)),
    )
    .set((
        items::status.eq(STATUS_READY_DIGESTED),
        items::updated_at.eq(db::current_time()),
    ))
    .execute(conn)
}

// Cluster members superseded by their representative settle as rejected
// duplicates, so a canonical hash reaches ready_digested at most once per
// window.
pub fn mark_duplicates(conn: &mut PgConnection, ids: &[i64]) -> Result<usize, Error> {
    diesel::update(
        items::table
            .filter(items::id.eq_any(ids))
            .filter(items::status.eq(STATUS_READY_PENDING)),
    )
    .set((
        items::status.eq(STATUS_REJECTED),
        items::drop_reason.eq("duplicate"),
        items::updated_at.eq(db::current_time()),
    ))
    .execute(conn)
}

// Explicit retry is the only way out of the error state.
pub fn retry(conn: &mut PgConnection, id: i64) -> Result<usize, Error> {
    let error: Option<Value> = None;

    let item = match find(conn, id) {
        Some(item) => item,
        None => return Ok(0),
    };

    let updated = diesel::update(items::table.filter(items::id.eq(id)))
        .set((
            items::status.eq(STATUS_PENDING),
            items::error.eq(error),
            items::updated_at.eq(db::current_time()),
        ))
        .execute(conn)?;

    crate::db::raw_messages::mark_unprocessed(conn, item.raw_id)?;

    Ok(updated)
}

pub fn retry_failed(conn: &mut PgConnection) -> Result<usize, Error> {
    let failed_raw_ids = items::table
        .filter(items::status.eq(STATUS_ERROR))
        .select(items::raw_id)
        .load::<i64>(conn)?;

    let error: Option<Value> = None;

    diesel::update(items::table.filter(items::status.eq(STATUS_ERROR)))
        .set((
            items::status.eq(STATUS_PENDING),
            items::error.eq(error),
            items::updated_at.eq(db::current_time()),
        ))
        .execute(conn)?;

    crate::db::raw_messages::mark_all_unprocessed(conn, &failed_raw_ids)
}

pub fn failed(conn: &mut PgConnection, count: i64) -> Result<Vec<Item>, Error> {
    items::table
        .filter(items::status.eq(STATUS_ERROR))
        .order(items::updated_at.desc())
        .limit(count)
        .load::<Item>(conn)
}

pub fn count_by_status(conn: &mut PgConnection, status: &str) -> Result<i64, Error> {
    let result = items::table
        .filter(items::status.eq(status))
        .count()
        .first::<i64>(conn);

    if let Err(Error::NotFound) = result {
        return Ok(0);
    }

    result
}

pub fn drop_reason_counts(
    conn: &mut PgConnection,
    since: DateTime<Utc>,
) -> Result<Vec<(String, i64)>, Error> {
    items::table
        .filter(items::status.eq(STATUS_REJECTED))
        .filter(items::created_at.ge(since))
        .filter(items::drop_reason.is_not_null())
        .group_by(items::drop_reason)
        .select((items::drop_reason.assume_not_null(), diesel::dsl::count_star()))
        .order(diesel::dsl::count_star().desc())
        .load::<(String, i64)>(conn)
}

pub fn recent_ready(
    conn: &mut PgConnection,
    since: DateTime<Utc>,
    count: i64,
) -> Result<Vec<Item>, Error> {
    items::table
        .filter(items::status.eq_any(vec![STATUS_READY_PENDING, STATUS_READY_DIGESTED]))
        .filter(items::tg_date.ge(since))
        .order(items::tg_date.desc())
        .limit(count)
        .load::<Item>(conn)
}

pub fn delete_terminal_older_than(
    conn: &mut PgConnection,
    channel_id: i64,
    retention_days: i64,
) -> Result<usize, Error> {
    let cutoff = db::current_time() - Duration::days(retention_days);

    let delete_query = items::table
        .filter(items::channel_id.eq(channel_id))
        .filter(items::status.eq_any(vec![STATUS_REJECTED, STATUS_READY_DIGESTED]))
        .filter(items::tg_date.lt(cutoff));

    diesel::delete(delete_query).execute(conn)
}

#[cfg(test)]
mod tests {
    use super::NewItem;
    use crate::db;
    use crate::db::{channels, raw_messages};
    use crate::models::item::{STATUS_ERROR, STATUS_PENDING, STATUS_READY_PENDING};
    use diesel::result::Error;
    use diesel::Connection;
    use serde_json::json;

    fn build_item(raw_id: i64, channel_id: i64, status: &str) -> NewItem {
        NewItem {
            raw_id,
            channel_id,
            summary: "Summary".to_string(),
            topic: None,
            relevance: 0.8,
            importance: 0.7,
            status: status.to_string(),
            error: None,
            drop_reason: None,
            content_hash: "hash".to_string(),
            tg_date: db::current_time(),
        }
    }

    #[test]
    fn create_allows_at_most_one_item_per_raw_message() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();
            let raw = raw_messages::create(
                connection,
                raw_messages::tests::build_message(channel.id, 1, "hello"),
            )
            .unwrap()
            .unwrap();

            let item = super::create(connection, build_item(raw.id, channel.id, STATUS_READY_PENDING))
                .unwrap();
            assert!(item.is_some());

            let duplicate =
                super::create(connection, build_item(raw.id, channel.id, STATUS_READY_PENDING))
                    .unwrap();
            assert!(duplicate.is_none());

            Ok(())
        });
    }

    #[test]
    fn retry_failed_resets_error_items_and_their_raw_messages() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();
            let raw = raw_messages::create(
                connection,
                raw_messages::tests::build_message(channel.id, 1, "hello"),
            )
            .unwrap()
            .unwrap();
            raw_messages::mark_processed(connection, raw.id).unwrap();

            let mut new_item = build_item(raw.id, channel.id, STATUS_ERROR);
            new_item.error = Some(json!({"kind": "empty_summary"}));
            let item = super::create(connection, new_item).unwrap().unwrap();

            let reset = super::retry_failed(connection).unwrap();
            assert_eq!(reset, 1);

            let item = super::find(connection, item.id).unwrap();
            assert_eq!(item.status, STATUS_PENDING);
            assert!(item.error.is_none());

            let raw = raw_messages::find(connection, raw.id).unwrap();
            assert!(!raw.processed);

            Ok(())
        });
    }

    #[test]
    fn mark_digested_only_touches_ready_pending_items() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();
            let raw = raw_messages::create(
                connection,
                raw_messages::tests::build_message(channel.id, 1, "hello"),
            )
            .unwrap()
            .unwrap();
            let other_raw = raw_messages::create(
                connection,
                raw_messages::tests::build_message(channel.id, 2, "other"),
            )
            .unwrap()
            .unwrap();

            let ready = super::create(
                connection,
                build_item(raw.id, channel.id, STATUS_READY_PENDING),
            )
            .unwrap()
            .unwrap();
            let errored = super::create(connection, build_item(other_raw.id, channel.id, STATUS_ERROR))
                .unwrap()
                .unwrap();

            let updated = super::mark_digested(connection, &[ready.id, errored.id]).unwrap();
            assert_eq!(updated, 1);

            assert_eq!(
                super::find(connection, errored.id).unwrap().status,
                STATUS_ERROR
            );

            Ok(())
        });
    }
}
