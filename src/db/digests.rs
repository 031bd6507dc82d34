use crate::db;
use crate::models::Digest;
use crate::schema::digests;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error;
use serde_json::json;

pub fn create(
    conn: &mut PgConnection,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    item_ids: &[i64],
) -> Result<Digest, Error> {
    diesel::insert_into(digests::table)
        .values((
            digests::started_at.eq(started_at),
            digests::ended_at.eq(ended_at),
            digests::item_ids.eq(json!(item_ids)),
        ))
        .get_result::<Digest>(conn)
}

pub fn find(conn: &mut PgConnection, id: i64) -> Option<Digest> {
    digests::table
        .filter(digests::id.eq(id))
        .first::<Digest>(conn)
        .ok()
}

pub fn mark_posted(
    conn: &mut PgConnection,
    id: i64,
    chat_id: i64,
    first_message_id: i32,
) -> Result<Digest, Error> {
    diesel::update(digests::table.filter(digests::id.eq(id)))
        .set((
            digests::posted_at.eq(db::current_time()),
            digests::chat_id.eq(chat_id),
            digests::first_message_id.eq(first_message_id),
        ))
        .get_result::<Digest>(conn)
}

pub fn set_error(conn: &mut PgConnection, id: i64, error: &str) -> Result<usize, Error> {
    diesel::update(digests::table.filter(digests::id.eq(id)))
        .set(digests::error.eq(error))
        .execute(conn)
}

pub fn clear_errors(conn: &mut PgConnection) -> Result<usize, Error> {
    let error: Option<String> = None;

    diesel::update(digests::table.filter(digests::error.is_not_null()))
        .set(digests::error.eq(error))
        .execute(conn)
}

pub fn last_posted(conn: &mut PgConnection) -> Option<Digest> {
    digests::table
        .filter(digests::posted_at.is_not_null())
        .order(digests::posted_at.desc())
        .first::<Digest>(conn)
        .ok()
}

pub fn recent(conn: &mut PgConnection, count: i64) -> Result<Vec<Digest>, Error> {
    digests::table
        .order(digests::created_at.desc())
        .limit(count)
        .load::<Digest>(conn)
}

pub fn set_vote_counts(
    conn: &mut PgConnection,
    id: i64,
    up_votes: i32,
    down_votes: i32,
) -> Result<usize, Error> {
    diesel::update(digests::table.filter(digests::id.eq(id)))
        .set((
            digests::up_votes.eq(up_votes),
            digests::down_votes.eq(down_votes),
        ))
        .execute(conn)
}

#[cfg(test)]
mod tests {
    use crate::db;
    use diesel::result::Error;
    use diesel::Connection;

    #[test]
    fn create_and_mark_posted() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let now = db::current_time();
            let digest = super::create(connection, now, now, &[1, 2, 3]).unwrap();

            assert!(digest.posted_at.is_none());
            assert_eq!(digest.item_ids(), vec![1, 2, 3]);

            let digest = super::mark_posted(connection, digest.id, -100123, 55).unwrap();

            assert!(digest.posted_at.is_some());
            assert_eq!(digest.chat_id, Some(-100123));
            assert_eq!(digest.first_message_id, Some(55));

            Ok(())
        });
    }

    #[test]
    fn clear_errors_resets_failed_digests() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let now = db::current_time();
            let digest = super::create(connection, now, now, &[]).unwrap();

            super::set_error(connection, digest.id, "chat not found").unwrap();
            assert!(super::find(connection, digest.id).unwrap().error.is_some());

            let cleared = super::clear_errors(connection).unwrap();
            assert_eq!(cleared, 1);
            assert!(super::find(connection, digest.id).unwrap().error.is_none());

            Ok(())
        });
    }
}
