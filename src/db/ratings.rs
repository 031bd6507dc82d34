use crate::db;
use crate::models::{ItemRating, Rating};
use crate::schema::{item_ratings, ratings};
use diesel::prelude::*;
use diesel::result::Error;

// One vote per (digest, user); revoting flips the value. The digest row's
// aggregates are recounted in the same transaction.
pub fn save_digest_vote(
    conn: &mut PgConnection,
    digest_id: i64,
    user_id: i64,
    value: i32,
) -> Result<Rating, Error> {
    conn.transaction::<Rating, Error, _>(|conn| {
        let rating = diesel::insert_into(ratings::table)
            .values((
                ratings::digest_id.eq(digest_id),
                ratings::user_id.eq(user_id),
                ratings::value.eq(value),
            ))
            .on_conflict((ratings::digest_id, ratings::user_id))
            .do_update()
            .set((
                ratings::value.eq(value),
                ratings::updated_at.eq(db::current_time()),
            ))
            .get_result::<Rating>(conn)?;

        let up_votes = ratings::table
            .filter(ratings::digest_id.eq(digest_id))
            .filter(ratings::value.eq(1))
            .count()
            .first::<i64>(conn)?;

        let down_votes = ratings::table
            .filter(ratings::digest_id.eq(digest_id))
            .filter(ratings::value.eq(-1))
            .count()
            .first::<i64>(conn)?;

        db::digests::set_vote_counts(conn, digest_id, up_votes as i32, down_votes as i32)?;

        Ok(rating)
    })
}

pub fn save_item_rating(
    conn: &mut PgConnection,
    item_id: i64,
    user_id: i64,
    value: &str,
    comment: Option<String>,
) -> Result<ItemRating, Error> {
    diesel::insert_into(item_ratings::table)
        .values((
            item_ratings::item_id.eq(item_id),
            item_ratings::user_id.eq(user_id),
            item_ratings::value.eq(value),
            item_ratings::comment.eq(comment.clone()),
        ))
        .on_conflict((item_ratings::item_id, item_ratings::user_id))
        .do_update()
        .set((
            item_ratings::value.eq(value),
            item_ratings::comment.eq(comment.clone()),
            item_ratings::updated_at.eq(db::current_time()),
        ))
        .get_result::<ItemRating>(conn)
}

pub fn find_item_ratings(conn: &mut PgConnection, item_id: i64) -> Result<Vec<ItemRating>, Error> {
    item_ratings::table
        .filter(item_ratings::item_id.eq(item_id))
        .order(item_ratings::updated_at.desc())
        .load::<ItemRating>(conn)
}

#[cfg(test)]
mod tests {
    use crate::db;
    use crate::db::{channels, digests, items, raw_messages};
    use crate::models::item::STATUS_READY_DIGESTED;
    use diesel::result::Error;
    use diesel::Connection;

    #[test]
    fn save_digest_vote_upserts_and_recounts() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let now = db::current_time();
            let digest = digests::create(connection, now, now, &[]).unwrap();

            super::save_digest_vote(connection, digest.id, 1, 1).unwrap();
            super::save_digest_vote(connection, digest.id, 2, -1).unwrap();

            let digest = digests::find(connection, digest.id).unwrap();
            assert_eq!(digest.up_votes, 1);
            assert_eq!(digest.down_votes, 1);

            // User 2 changes their mind.
            super::save_digest_vote(connection, digest.id, 2, 1).unwrap();

            let digest = digests::find(connection, digest.id).unwrap();
            assert_eq!(digest.up_votes, 2);
            assert_eq!(digest.down_votes, 0);

            Ok(())
        });
    }

    #[test]
    fn save_item_rating_replaces_previous_value() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();
            let raw = raw_messages::create(
                connection,
                raw_messages::tests::build_message(channel.id, 1, "hello"),
            )
            .unwrap()
            .unwrap();
            let item = items::create(
                connection,
                items::NewItem {
                    raw_id: raw.id,
                    channel_id: channel.id,
                    summary: "Summary".to_string(),
                    topic: None,
                    relevance: 0.9,
                    importance: 0.9,
                    status: STATUS_READY_DIGESTED.to_string(),
                    error: None,
                    drop_reason: None,
                    content_hash: raw.content_hash.clone(),
                    tg_date: raw.tg_date,
                },
            )
            .unwrap()
            .unwrap();

            super::save_item_rating(connection, item.id, 42, "good", None).unwrap();
            let rating =
                super::save_item_rating(connection, item.id, 42, "bad", Some("spam".to_string()))
                    .unwrap();

            assert_eq!(rating.value, "bad");
            assert_eq!(rating.comment, Some("spam".to_string()));

            let all = super::find_item_ratings(connection, item.id).unwrap();
            assert_eq!(all.len(), 1);

            Ok(())
        });
    }
}
