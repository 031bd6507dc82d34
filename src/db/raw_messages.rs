use crate::db;
use crate::models::RawMessage;
use crate::schema::raw_messages;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::result::Error;
use serde_json::Value;

#[derive(Insertable, Debug)]
#[diesel(table_name = raw_messages)]
pub struct NewRawMessage {
    pub channel_id: i64,
    pub tg_message_id: i32,
    pub tg_date: DateTime<Utc>,
    pub text: String,
    pub entities: Option<Value>,
    pub media: Option<Value>,
    pub content_hash: String,
    pub is_forward: bool,
    pub views: i32,
    pub forwards: i32,
}

// Re-fetches of the same history page are no-ops.
pub fn create(conn: &mut PgConnection, new_message: NewRawMessage) -> Result<Option<RawMessage>, Error> {
    diesel::insert_into(raw_messages::table)
        .values(new_message)
        .on_conflict_do_nothing()
        .get_result::<RawMessage>(conn)
        .optional()
}

pub fn find(conn: &mut PgConnection, id: i64) -> Option<RawMessage> {
    raw_messages::table
        .filter(raw_messages::id.eq(id))
        .first::<RawMessage>(conn)
        .ok()
}

pub fn find_by_channel_message(
    conn: &mut PgConnection,
    channel_id: i64,
    tg_message_id: i32,
) -> Option<RawMessage> {
    raw_messages::table
        .filter(raw_messages::channel_id.eq(channel_id))
        .filter(raw_messages::tg_message_id.eq(tg_message_id))
        .first::<RawMessage>(conn)
        .ok()
}

pub fn find_unprocessed(conn: &mut PgConnection, count: i64) -> Result<Vec<RawMessage>, Error> {
    raw_messages::table
        .filter(raw_messages::processed.eq(false))
        .order(raw_messages::id)
        .limit(count)
        .load::<RawMessage>(conn)
}

pub fn mark_processed(conn: &mut PgConnection, id: i64) -> Result<usize, Error> {
    diesel::update(raw_messages::table.filter(raw_messages::id.eq(id)))
        .set((
            raw_messages::processed.eq(true),
            raw_messages::updated_at.eq(db::current_time()),
        ))
        .execute(conn)
}

pub fn mark_unprocessed(conn: &mut PgConnection, id: i64) -> Result<usize, Error> {
    diesel::update(raw_messages::table.filter(raw_messages::id.eq(id)))
        .set((
            raw_messages::processed.eq(false),
            raw_messages::updated_at.eq(db::current_time()),
        ))
        .execute(conn)
}

pub fn mark_all_unprocessed(conn: &mut PgConnection, ids: &[i64]) -> Result<usize, Error> {
    diesel::update(raw_messages::table.filter(raw_messages::id.eq_any(ids)))
        .set((
            raw_messages::processed.eq(false),
            raw_messages::updated_at.eq(db::current_time()),
        ))
        .execute(conn)
}

pub fn set_media(conn: &mut PgConnection, id: i64, media: Value) -> Result<usize, Error> {
    diesel::update(raw_messages::table.filter(raw_messages::id.eq(id)))
        .set((
            raw_messages::media.eq(media),
            raw_messages::updated_at.eq(db::current_time()),
        ))
        .execute(conn)
}

pub fn set_link_preview(conn: &mut PgConnection, id: i64, preview: Value) -> Result<usize, Error> {
    diesel::update(raw_messages::table.filter(raw_messages::id.eq(id)))
        .set((
            raw_messages::link_preview.eq(preview),
            raw_messages::updated_at.eq(db::current_time()),
        ))
        .execute(conn)
}

// Returns true exactly once per message; extraction re-runs become no-ops.
pub fn mark_discovery_extracted(conn: &mut PgConnection, id: i64) -> Result<bool, Error> {
    let updated = diesel::update(
        raw_messages::table
            .filter(raw_messages::id.eq(id))
            .filter(raw_messages::discovery_extracted.eq(false)),
    )
    .set((
        raw_messages::discovery_extracted.eq(true),
        raw_messages::updated_at.eq(db::current_time()),
    ))
    .execute(conn)?;

    Ok(updated == 1)
}

pub fn count_unprocessed(conn: &mut PgConnection) -> Result<i64, Error> {
    let result = raw_messages::table
        .filter(raw_messages::processed.eq(false))
        .count()
        .first::<i64>(conn);

    if let Err(Error::NotFound) = result {
        return Ok(0);
    }

    result
}

// Raw messages whose item is still live are kept; deleting them would
// cascade into the item.
pub fn delete_older_than(
    conn: &mut PgConnection,
    channel_id: i64,
    retention_days: i64,
) -> Result<usize, Error> {
    let cutoff = db::current_time() - Duration::days(retention_days);

    let delete_query = raw_messages::table
        .filter(raw_messages::channel_id.eq(channel_id))
        .filter(raw_messages::processed.eq(true))
        .filter(raw_messages::tg_date.lt(cutoff))
        .filter(diesel::dsl::not(diesel::dsl::exists(
            crate::schema::items::table
                .filter(crate::schema::items::raw_id.eq(raw_messages::id)),
        )));

    diesel::delete(delete_query).execute(conn)
}

#[cfg(test)]
pub mod tests {
    use super::NewRawMessage;
    use crate::db;
    use crate::db::channels;
    use crate::reader::hash;
    use diesel::result::Error;
    use diesel::Connection;

    pub fn build_message(channel_id: i64, tg_message_id: i32, text: &str) -> NewRawMessage {
        NewRawMessage {
            channel_id,
            tg_message_id,
            tg_date: db::current_time(),
            text: text.to_string(),
            entities: None,
            media: None,
            content_hash: hash::canonical_hash(text),
            is_forward: false,
            views: 0,
            forwards: 0,
        }
    }

    #[test]
    fn create_is_idempotent_per_channel_message() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();

            let message = super::create(connection, build_message(channel.id, 1, "hello"))
                .unwrap()
                .unwrap();

            let duplicate = super::create(connection, build_message(channel.id, 1, "hello")).unwrap();

            assert!(duplicate.is_none());
            assert_eq!(
                super::find(connection, message.id).unwrap().id,
                message.id
            );

            Ok(())
        });
    }

    #[test]
    fn mark_discovery_extracted_returns_true_once() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();
            let message = super::create(connection, build_message(channel.id, 1, "hello"))
                .unwrap()
                .unwrap();

            assert!(super::mark_discovery_extracted(connection, message.id).unwrap());
            assert!(!super::mark_discovery_extracted(connection, message.id).unwrap());

            Ok(())
        });
    }

    #[test]
    fn find_unprocessed_returns_messages_in_arrival_order() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();

            let first = super::create(connection, build_message(channel.id, 1, "first"))
                .unwrap()
                .unwrap();
            let second = super::create(connection, build_message(channel.id, 2, "second"))
                .unwrap()
                .unwrap();

            super::mark_processed(connection, first.id).unwrap();

            let unprocessed = super::find_unprocessed(connection, 10).unwrap();

            assert_eq!(unprocessed.len(), 1);
            assert_eq!(unprocessed[0].id, second.id);

            Ok(())
        });
    }
}
