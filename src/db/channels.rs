use crate::db;
use crate::models::channel::{MAX_WEIGHT, MIN_WEIGHT, WEIGHT_MODE_AUTO, WEIGHT_MODE_MANUAL};
use crate::models::Channel;
use crate::schema::channels;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::result::Error;
use diesel::sql_types::Int4;

const MAX_FETCH_RETRIES: i32 = 5;

#[derive(Insertable, Default)]
#[diesel(table_name = channels)]
pub struct NewChannel {
    pub username: Option<String>,
    pub invite_link: Option<String>,
    pub peer_id: Option<i64>,
    pub access_hash: Option<i64>,
    pub title: Option<String>,
}

pub fn create(conn: &mut PgConnection, new_channel: NewChannel) -> Result<Channel, Error> {
    diesel::insert_into(channels::table)
        .values(new_channel)
        .on_conflict_do_nothing()
        .get_result::<Channel>(conn)
}

pub fn create_by_username(conn: &mut PgConnection, username: &str) -> Result<Channel, Error> {
    let normalized = username.trim_start_matches('@').to_string();

    if let Some(channel) = find_by_username(conn, &normalized) {
        return Ok(channel);
    }

    create(
        conn,
        NewChannel {
            username: Some(normalized),
            ..Default::default()
        },
    )
}

pub fn find(conn: &mut PgConnection, id: i64) -> Option<Channel> {
    channels::table
        .filter(channels::id.eq(id))
        .first::<Channel>(conn)
        .ok()
}

pub fn find_by_username(conn: &mut PgConnection, username: &str) -> Option<Channel> {
    let normalized = username.trim_start_matches('@').to_string();

    channels::table
        .filter(channels::username.ilike(normalized))
        .first::<Channel>(conn)
        .ok()
}

pub fn find_by_peer_id(conn: &mut PgConnection, peer_id: i64) -> Option<Channel> {
    channels::table
        .filter(channels::peer_id.eq(peer_id))
        .first::<Channel>(conn)
        .ok()
}

pub fn all_active(conn: &mut PgConnection) -> Result<Vec<Channel>, Error> {
    channels::table
        .filter(channels::active.eq(true))
        .order(channels::id)
        .load::<Channel>(conn)
}

pub fn all(conn: &mut PgConnection) -> Result<Vec<Channel>, Error> {
    channels::table.order(channels::id).load::<Channel>(conn)
}

pub fn set_resolved(
    conn: &mut PgConnection,
    channel: &Channel,
    peer_id: i64,
    access_hash: i64,
    title: Option<String>,
    description: Option<String>,
    username: Option<String>,
) -> Result<Channel, Error> {
    diesel::update(channel)
        .set((
            channels::peer_id.eq(peer_id),
            channels::access_hash.eq(access_hash),
            channels::title.eq(title),
            channels::description.eq(description),
            channels::username.eq(username),
            channels::updated_at.eq(db::current_time()),
        ))
        .get_result::<Channel>(conn)
}

// The high-water mark never goes backwards.
pub fn advance_last_tg_message_id(
    conn: &mut PgConnection,
    channel: &Channel,
    tg_message_id: i32,
) -> Result<Channel, Error> {
    diesel::update(channel)
        .set((
            channels::last_tg_message_id.eq(sql::<Int4>("GREATEST(last_tg_message_id, ")
                .bind::<Int4, _>(tg_message_id)
                .sql(")")),
            channels::updated_at.eq(db::current_time()),
        ))
        .get_result::<Channel>(conn)
}

pub fn set_error(conn: &mut PgConnection, channel: &Channel, error: &str) -> Result<Channel, Error> {
    let next_retry_number = if channel.fetch_retries == MAX_FETCH_RETRIES {
        MAX_FETCH_RETRIES
    } else {
        channel.fetch_retries + 1
    };

    diesel::update(channel)
        .set((
            channels::error.eq(error),
            channels::fetch_retries.eq(next_retry_number),
            channels::updated_at.eq(db::current_time()),
        ))
        .get_result::<Channel>(conn)
}

pub fn reset_error(conn: &mut PgConnection, channel: &Channel) -> Result<Channel, Error> {
    let error: Option<String> = None;

    diesel::update(channel)
        .set((
            channels::error.eq(error),
            channels::fetch_retries.eq(0),
            channels::updated_at.eq(db::current_time()),
        ))
        .get_result::<Channel>(conn)
}

pub fn set_weight(conn: &mut PgConnection, channel: &Channel, weight: f64) -> Result<Channel, Error> {
    diesel::update(channel)
        .set((
            channels::importance_weight.eq(weight.clamp(MIN_WEIGHT, MAX_WEIGHT)),
            channels::weight_mode.eq(WEIGHT_MODE_MANUAL),
            channels::updated_at.eq(db::current_time()),
        ))
        .get_result::<Channel>(conn)
}

// Auto-weight updates skip channels pinned by an operator.
pub fn set_auto_weight(
    conn: &mut PgConnection,
    channel_id: i64,
    weight: f64,
) -> Result<usize, Error> {
    diesel::update(
        channels::table
            .filter(channels::id.eq(channel_id))
            .filter(channels::weight_mode.eq(WEIGHT_MODE_AUTO)),
    )
    .set((
        channels::importance_weight.eq(weight.clamp(MIN_WEIGHT, MAX_WEIGHT)),
        channels::updated_at.eq(db::current_time()),
    ))
    .execute(conn)
}

pub fn set_weight_mode(
    conn: &mut PgConnection,
    channel: &Channel,
    mode: &str,
) -> Result<Channel, Error> {
    diesel::update(channel)
        .set((
            channels::weight_mode.eq(mode),
            channels::updated_at.eq(db::current_time()),
        ))
        .get_result::<Channel>(conn)
}

pub fn set_relevance_delta(
    conn: &mut PgConnection,
    channel: &Channel,
    delta: Option<f64>,
) -> Result<Channel, Error> {
    diesel::update(channel)
        .set((
            channels::relevance_delta.eq(delta),
            channels::updated_at.eq(db::current_time()),
        ))
        .get_result::<Channel>(conn)
}

pub fn set_active(conn: &mut PgConnection, channel: &Channel, active: bool) -> Result<Channel, Error> {
    diesel::update(channel)
        .set((
            channels::active.eq(active),
            channels::updated_at.eq(db::current_time()),
        ))
        .get_result::<Channel>(conn)
}

pub fn remove(conn: &mut PgConnection, channel_id: i64) -> Result<usize, Error> {
    let record_query = channels::table.filter(channels::id.eq(channel_id));

    diesel::delete(record_query).execute(conn)
}

pub fn count_active(conn: &mut PgConnection) -> Result<i64, Error> {
    let result = channels::table
        .filter(channels::active.eq(true))
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
    use diesel::result::Error;
    use diesel::Connection;

    #[test]
    fn create_by_username_creates_channel() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = super::create_by_username(connection, "@rustlang").unwrap();

            assert_eq!(channel.username, Some("rustlang".to_string()));
            assert_eq!(channel.importance_weight, 1.0);
            assert_eq!(channel.last_tg_message_id, 0);
            assert!(channel.active);

            Ok(())
        });
    }

    #[test]
    fn create_by_username_returns_existing_channel() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = super::create_by_username(connection, "rustlang").unwrap();
            let same_channel = super::create_by_username(connection, "@RustLang").unwrap();

            assert_eq!(channel.id, same_channel.id);

            Ok(())
        });
    }

    #[test]
    fn advance_last_tg_message_id_is_monotone() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = super::create_by_username(connection, "rustlang").unwrap();

            let channel = super::advance_last_tg_message_id(connection, &channel, 10).unwrap();
            assert_eq!(channel.last_tg_message_id, 10);

            let channel = super::advance_last_tg_message_id(connection, &channel, 5).unwrap();
            assert_eq!(channel.last_tg_message_id, 10);

            let channel = super::advance_last_tg_message_id(connection, &channel, 11).unwrap();
            assert_eq!(channel.last_tg_message_id, 11);

            Ok(())
        });
    }

    #[test]
    fn set_error_increments_retries_up_to_limit() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let mut channel = super::create_by_username(connection, "rustlang").unwrap();

            for expected in 1..=5 {
                channel = super::set_error(connection, &channel, "FLOOD_WAIT").unwrap();
                assert_eq!(channel.fetch_retries, expected);
            }

            channel = super::set_error(connection, &channel, "FLOOD_WAIT").unwrap();
            assert_eq!(channel.fetch_retries, 5);

            let channel = super::reset_error(connection, &channel).unwrap();
            assert_eq!(channel.fetch_retries, 0);
            assert!(channel.error.is_none());

            Ok(())
        });
    }

    #[test]
    fn set_auto_weight_skips_manual_channels() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = super::create_by_username(connection, "rustlang").unwrap();
            let channel = super::set_weight(connection, &channel, 1.5).unwrap();

            assert_eq!(channel.weight_mode, "manual");

            let updated = super::set_auto_weight(connection, channel.id, 0.3).unwrap();
            assert_eq!(updated, 0);

            let channel = super::find(connection, channel.id).unwrap();
            assert_eq!(channel.importance_weight, 1.5);

            Ok(())
        });
    }

    #[test]
    fn set_weight_clamps_to_range() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = super::create_by_username(connection, "rustlang").unwrap();

            let channel = super::set_weight(connection, &channel, 5.0).unwrap();
            assert_eq!(channel.importance_weight, 2.0);

            let channel = super::set_weight(connection, &channel, 0.0).unwrap();
            assert_eq!(channel.importance_weight, 0.1);

            Ok(())
        });
    }
}
