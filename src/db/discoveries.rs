use crate::db;
use crate::models::discovery::{STATUS_APPROVED, STATUS_MATCHED, STATUS_PENDING, STATUS_REJECTED};
use crate::models::Discovery;
use crate::schema::discoveries;
use diesel::prelude::*;
use diesel::result::Error;

#[derive(Debug, Clone)]
pub struct NewDiscovery {
    pub source_type: String,
    pub username: Option<String>,
    pub peer_id: Option<i64>,
    pub invite_hash: Option<String>,
    pub title: Option<String>,
    pub engagement: i64,
}

#[derive(Insertable)]
#[diesel(table_name = discoveries)]
struct InsertableDiscovery {
    source_type: String,
    username: Option<String>,
    peer_id: Option<i64>,
    invite_hash: Option<String>,
    title: Option<String>,
    engagement: i64,
    status: String,
}

// Repeated sightings bump counters; approved/rejected stay approved/rejected.
// A candidate that is already tracked lands as matched instead of pending.
pub fn upsert(conn: &mut PgConnection, new_discovery: NewDiscovery) -> Result<Discovery, Error> {
    let existing = find_by_key(conn, &new_discovery);

    match existing {
        Some(discovery) => diesel::update(&discovery)
            .set((
                discoveries::discovery_count.eq(discovery.discovery_count + 1),
                discoveries::engagement.eq(discovery.engagement + new_discovery.engagement),
                discoveries::title.eq(discovery.title.clone().or(new_discovery.title)),
                discoveries::last_seen_at.eq(db::current_time()),
            ))
            .get_result::<Discovery>(conn),

        None => {
            let status = if already_tracked(conn, &new_discovery) {
                STATUS_MATCHED
            } else {
                STATUS_PENDING
            };

            let record = InsertableDiscovery {
                source_type: new_discovery.source_type,
                username: new_discovery
                    .username
                    .map(|username| username.trim_start_matches('@').to_lowercase()),
                peer_id: new_discovery.peer_id,
                invite_hash: new_discovery.invite_hash,
                title: new_discovery.title,
                engagement: new_discovery.engagement,
                status: status.to_string(),
            };

            diesel::insert_into(discoveries::table)
                .values(record)
                .get_result::<Discovery>(conn)
        }
    }
}

fn already_tracked(conn: &mut PgConnection, new_discovery: &NewDiscovery) -> bool {
    if let Some(username) = &new_discovery.username {
        if crate::db::channels::find_by_username(conn, username).is_some() {
            return true;
        }
    }

    if let Some(peer_id) = new_discovery.peer_id {
        if crate::db::channels::find_by_peer_id(conn, peer_id).is_some() {
            return true;
        }
    }

    false
}

fn find_by_key(conn: &mut PgConnection, new_discovery: &NewDiscovery) -> Option<Discovery> {
    if let Some(username) = &new_discovery.username {
        let normalized = username.trim_start_matches('@').to_lowercase();

        return discoveries::table
            .filter(discoveries::username.eq(normalized))
            .first::<Discovery>(conn)
            .ok();
    }

    if let Some(peer_id) = new_discovery.peer_id {
        return discoveries::table
            .filter(discoveries::peer_id.eq(peer_id))
            .first::<Discovery>(conn)
            .ok();
    }

    if let Some(invite_hash) = &new_discovery.invite_hash {
        return discoveries::table
            .filter(discoveries::invite_hash.eq(invite_hash))
            .first::<Discovery>(conn)
            .ok();
    }

    None
}

pub fn find(conn: &mut PgConnection, id: i64) -> Option<Discovery> {
    discoveries::table
        .filter(discoveries::id.eq(id))
        .first::<Discovery>(conn)
        .ok()
}

pub fn list_pending(conn: &mut PgConnection, count: i64) -> Result<Vec<Discovery>, Error> {
    discoveries::table
        .filter(discoveries::status.eq(STATUS_PENDING))
        .order((discoveries::engagement.desc(), discoveries::discovery_count.desc()))
        .limit(count)
        .load::<Discovery>(conn)
}

// Peer-id-only rows the reader tries to resolve in the background.
pub fn pending_unresolved_peers(conn: &mut PgConnection, count: i64) -> Result<Vec<Discovery>, Error> {
    discoveries::table
        .filter(discoveries::status.eq(STATUS_PENDING))
        .filter(discoveries::username.is_null())
        .filter(discoveries::peer_id.is_not_null())
        .order(discoveries::last_seen_at.desc())
        .limit(count)
        .load::<Discovery>(conn)
}

pub fn pending_invites(conn: &mut PgConnection, count: i64) -> Result<Vec<Discovery>, Error> {
    discoveries::table
        .filter(discoveries::status.eq(STATUS_PENDING))
        .filter(discoveries::invite_hash.is_not_null())
        .order(discoveries::last_seen_at.desc())
        .limit(count)
        .load::<Discovery>(conn)
}

pub fn set_resolved(
    conn: &mut PgConnection,
    discovery: &Discovery,
    username: Option<String>,
    title: Option<String>,
) -> Result<Discovery, Error> {
    diesel::update(discovery)
        .set((
            discoveries::username.eq(username.map(|username| username.to_lowercase())),
            discoveries::title.eq(title),
            discoveries::last_seen_at.eq(db::current_time()),
        ))
        .get_result::<Discovery>(conn)
}

// Approve and reject are sticky. The first terminal transition wins.
pub fn approve(conn: &mut PgConnection, id: i64) -> Result<Option<Discovery>, Error> {
    transition(conn, id, STATUS_APPROVED)
}

pub fn reject(conn: &mut PgConnection, id: i64) -> Result<Option<Discovery>, Error> {
    transition(conn, id, STATUS_REJECTED)
}

pub fn mark_matched(conn: &mut PgConnection, id: i64) -> Result<Option<Discovery>, Error> {
    transition(conn, id, STATUS_MATCHED)
}

fn transition(conn: &mut PgConnection, id: i64, status: &str) -> Result<Option<Discovery>, Error> {
    diesel::update(
        discoveries::table
            .filter(discoveries::id.eq(id))
            .filter(discoveries::status.eq_any(vec![STATUS_PENDING, STATUS_MATCHED])),
    )
    .set((
        discoveries::status.eq(status),
        discoveries::last_seen_at.eq(db::current_time()),
    ))
    .get_result::<Discovery>(conn)
    .optional()
}

pub fn count_pending(conn: &mut PgConnection) -> Result<i64, Error> {
    let result = discoveries::table
        .filter(discoveries::status.eq(STATUS_PENDING))
        .count()
        .first::<i64>(conn);

    if let Err(Error::NotFound) = result {
        return Ok(0);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::NewDiscovery;
    use crate::db;
    use diesel::result::Error;
    use diesel::Connection;

    fn forward_discovery(username: &str) -> NewDiscovery {
        NewDiscovery {
            source_type: "forward".to_string(),
            username: Some(username.to_string()),
            peer_id: None,
            invite_hash: None,
            title: None,
            engagement: 10,
        }
    }

    #[test]
    fn upsert_bumps_counters_for_repeated_sightings() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let discovery = super::upsert(connection, forward_discovery("@NewsChannel")).unwrap();
            assert_eq!(discovery.discovery_count, 1);
            assert_eq!(discovery.engagement, 10);
            assert_eq!(discovery.username, Some("newschannel".to_string()));

            let discovery = super::upsert(connection, forward_discovery("newschannel")).unwrap();
            assert_eq!(discovery.discovery_count, 2);
            assert_eq!(discovery.engagement, 20);

            Ok(())
        });
    }

    #[test]
    fn approve_then_reject_keeps_approved() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let discovery = super::upsert(connection, forward_discovery("newschannel")).unwrap();

            let approved = super::approve(connection, discovery.id).unwrap().unwrap();
            assert_eq!(approved.status, "approved");

            let rejected = super::reject(connection, discovery.id).unwrap();
            assert!(rejected.is_none());

            let discovery = super::find(connection, discovery.id).unwrap();
            assert_eq!(discovery.status, "approved");

            Ok(())
        });
    }

    #[test]
    fn upsert_marks_already_tracked_channels_as_matched() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            crate::db::channels::create_by_username(connection, "newschannel").unwrap();

            let discovery = super::upsert(connection, forward_discovery("@NewsChannel")).unwrap();

            assert_eq!(discovery.status, "matched");

            Ok(())
        });
    }

    #[test]
    fn upsert_does_not_reset_terminal_status() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let discovery = super::upsert(connection, forward_discovery("newschannel")).unwrap();
            super::reject(connection, discovery.id).unwrap();

            let discovery = super::upsert(connection, forward_discovery("newschannel")).unwrap();

            assert_eq!(discovery.status, "rejected");
            assert_eq!(discovery.discovery_count, 2);

            Ok(())
        });
    }
}
