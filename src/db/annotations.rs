use crate::db;
use crate::models::item::{STATUS_READY_DIGESTED, STATUS_READY_PENDING};
use crate::models::Annotation;
use crate::schema::{annotations, items};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error;

// Queues recent processed items for human labeling. Items already queued are
// left untouched, so re-running with the same arguments is a no-op.
pub fn enqueue(conn: &mut PgConnection, since: DateTime<Utc>, limit: i64) -> Result<usize, Error> {
    let item_ids = items::table
        .filter(items::status.eq_any(vec![STATUS_READY_PENDING, STATUS_READY_DIGESTED]))
        .filter(items::tg_date.ge(since))
        .order(items::tg_date.desc())
        .limit(limit)
        .select(items::id)
        .load::<i64>(conn)?;

    let mut queued = 0;

    for item_id in item_ids {
        queued += diesel::insert_into(annotations::table)
            .values(annotations::item_id.eq(item_id))
            .on_conflict_do_nothing()
            .execute(conn)?;
    }

    Ok(queued)
}

// At most one item is assigned to a user at any time; calling assign again
// returns the current assignment.
pub fn assign(conn: &mut PgConnection, user_id: i64) -> Result<Option<Annotation>, Error> {
    conn.transaction::<Option<Annotation>, Error, _>(|conn| {
        let current = annotations::table
            .filter(annotations::assigned_to.eq(user_id))
            .filter(annotations::labeled_at.is_null())
            .first::<Annotation>(conn)
            .optional()?;

        if current.is_some() {
            return Ok(current);
        }

        let next = annotations::table
            .filter(annotations::assigned_to.is_null())
            .filter(annotations::labeled_at.is_null())
            .order(annotations::id)
            .for_update()
            .skip_locked()
            .first::<Annotation>(conn)
            .optional()?;

        match next {
            Some(annotation) => {
                let assigned = diesel::update(&annotation)
                    .set((
                        annotations::assigned_to.eq(user_id),
                        annotations::assigned_at.eq(db::current_time()),
                    ))
                    .get_result::<Annotation>(conn)?;

                Ok(Some(assigned))
            }
            None => Ok(None),
        }
    })
}

pub fn label(
    conn: &mut PgConnection,
    user_id: i64,
    label: &str,
    comment: Option<String>,
) -> Result<Option<Annotation>, Error> {
    diesel::update(
        annotations::table
            .filter(annotations::assigned_to.eq(user_id))
            .filter(annotations::labeled_at.is_null()),
    )
    .set((
        annotations::label.eq(label),
        annotations::comment.eq(comment),
        annotations::labeled_at.eq(db::current_time()),
    ))
    .get_result::<Annotation>(conn)
    .optional()
}

pub fn skip(conn: &mut PgConnection, user_id: i64) -> Result<usize, Error> {
    let assigned_to: Option<i64> = None;
    let assigned_at: Option<DateTime<Utc>> = None;

    diesel::update(
        annotations::table
            .filter(annotations::assigned_to.eq(user_id))
            .filter(annotations::labeled_at.is_null()),
    )
    .set((
        annotations::assigned_to.eq(assigned_to),
        annotations::assigned_at.eq(assigned_at),
    ))
    .execute(conn)
}

pub fn count_unlabeled(conn: &mut PgConnection) -> Result<i64, Error> {
    let result = annotations::table
        .filter(annotations::labeled_at.is_null())
        .count()
        .first::<i64>(conn);

    if let Err(Error::NotFound) = result {
        return Ok(0);
    }

    result
}

#[cfg(test)]
mod tests {
    use crate::db;
    use crate::db::{channels, items, raw_messages};
    use crate::models::item::STATUS_READY_PENDING;
    use chrono::Duration;
    use diesel::result::Error;
    use diesel::Connection;

    fn seed_item(connection: &mut diesel::PgConnection, tg_message_id: i32) -> i64 {
        let channel = channels::create_by_username(connection, "rustlang").unwrap();
        let raw = raw_messages::create(
            connection,
            raw_messages::tests::build_message(channel.id, tg_message_id, "hello"),
        )
        .unwrap()
        .unwrap();

        items::create(
            connection,
            items::NewItem {
                raw_id: raw.id,
                channel_id: channel.id,
                summary: "Summary".to_string(),
                topic: None,
                relevance: 0.8,
                importance: 0.8,
                status: STATUS_READY_PENDING.to_string(),
                error: None,
                drop_reason: None,
                content_hash: raw.content_hash.clone(),
                tg_date: raw.tg_date,
            },
        )
        .unwrap()
        .unwrap()
        .id
    }

    #[test]
    fn enqueue_is_idempotent() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            seed_item(connection, 1);
            let since = db::current_time() - Duration::hours(1);

            let first = super::enqueue(connection, since, 10).unwrap();
            let second = super::enqueue(connection, since, 10).unwrap();

            assert_eq!(first, 1);
            assert_eq!(second, 0);
            assert_eq!(super::count_unlabeled(connection).unwrap(), 1);

            Ok(())
        });
    }

    #[test]
    fn assign_hands_out_one_item_per_user() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            seed_item(connection, 1);
            seed_item(connection, 2);
            let since = db::current_time() - Duration::hours(1);
            super::enqueue(connection, since, 10).unwrap();

            let first = super::assign(connection, 42).unwrap().unwrap();
            let again = super::assign(connection, 42).unwrap().unwrap();

            assert_eq!(first.id, again.id);

            let other = super::assign(connection, 43).unwrap().unwrap();
            assert_ne!(first.id, other.id);

            Ok(())
        });
    }

    #[test]
    fn label_completes_the_assignment() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            seed_item(connection, 1);
            let since = db::current_time() - Duration::hours(1);
            super::enqueue(connection, since, 10).unwrap();

            super::assign(connection, 42).unwrap().unwrap();
            let labeled = super::label(connection, 42, "good", None).unwrap().unwrap();

            assert_eq!(labeled.label, Some("good".to_string()));
            assert!(labeled.labeled_at.is_some());

            // Nothing left to assign.
            assert!(super::assign(connection, 42).unwrap().is_none());

            Ok(())
        });
    }

    #[test]
    fn skip_releases_the_assignment() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            seed_item(connection, 1);
            let since = db::current_time() - Duration::hours(1);
            super::enqueue(connection, since, 10).unwrap();

            let assigned = super::assign(connection, 42).unwrap().unwrap();
            super::skip(connection, 42).unwrap();

            let reassigned = super::assign(connection, 43).unwrap().unwrap();
            assert_eq!(assigned.id, reassigned.id);

            Ok(())
        });
    }
}
