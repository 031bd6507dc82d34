use crate::models::Cluster;
use crate::schema::clusters;
use diesel::prelude::*;
use diesel::result::Error;
use serde_json::json;

pub fn create(
    conn: &mut PgConnection,
    digest_id: i64,
    topic: Option<String>,
    summary: Option<String>,
    item_ids: &[i64],
) -> Result<Cluster, Error> {
    diesel::insert_into(clusters::table)
        .values((
            clusters::digest_id.eq(digest_id),
            clusters::topic.eq(topic),
            clusters::summary.eq(summary),
            clusters::item_ids.eq(json!(item_ids)),
        ))
        .get_result::<Cluster>(conn)
}

pub fn find_by_digest(conn: &mut PgConnection, digest_id: i64) -> Result<Vec<Cluster>, Error> {
    clusters::table
        .filter(clusters::digest_id.eq(digest_id))
        .order(clusters::id)
        .load::<Cluster>(conn)
}
