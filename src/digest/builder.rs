use super::DigestError;
use crate::db;
use crate::db::settings;
use crate::llm;
use crate::models::{Channel, Item, RawMessage};
use chrono::{DateTime, Utc};
use diesel::PgConnection;
use std::collections::HashMap;

pub const DEDUP_MODE_STRICT: &str = "strict";
pub const DEDUP_MODE_SEMANTIC: &str = "semantic";

// Items live in a flat arena; clusters and the render plan refer to them by
// index only.
#[derive(Debug, Clone)]
pub struct ArenaItem {
    pub item: Item,
    pub channel_weight: f64,
    pub source_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClusterPlan {
    pub topic: Option<String>,
    pub summary: String,
    pub members: Vec<usize>,
    pub representative: usize,
}

#[derive(Debug, Clone)]
pub struct DigestPlan {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub items: Vec<ArenaItem>,
    pub clusters: Vec<ClusterPlan>,
    pub narrative: Option<String>,
    pub others_narrative: Option<String>,
    pub consolidated: bool,
}

impl ArenaItem {
    pub fn weighted_importance(&self) -> f64 {
        self.item.weighted_importance(self.channel_weight)
    }
}

impl DigestPlan {
    // The digest includes one item per cluster. The other members are
    // duplicates it superseded.
    pub fn included_item_ids(&self) -> Vec<i64> {
        self.clusters
            .iter()
            .map(|cluster| self.items[cluster.representative].item.id)
            .collect()
    }

    pub fn duplicate_item_ids(&self) -> Vec<i64> {
        self.clusters
            .iter()
            .flat_map(|cluster| cluster.members.iter())
            .filter(|member| {
                self.clusters
                    .iter()
                    .all(|cluster| cluster.representative != **member)
            })
            .map(|member| self.items[*member].item.id)
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics = vec![];

        for cluster in &self.clusters {
            if let Some(topic) = &cluster.topic {
                if !topics.contains(topic) {
                    topics.push(topic.clone());
                }
            }
        }

        topics
    }
}

pub fn build(
    conn: &mut PgConnection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Option<DigestPlan>, DigestError> {
    let rows = db::items::ready_pending_in_window(conn, start, end)?;

    if rows.is_empty() {
        return Ok(None);
    }

    let threshold = settings::importance_threshold(conn);

    let (selected, tail): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|(item, channel, _)| item.weighted_importance(channel.importance_weight) >= threshold);

    if selected.is_empty() {
        return Ok(None);
    }

    let items: Vec<ArenaItem> = selected
        .into_iter()
        .map(|(item, channel, raw_message)| ArenaItem {
            source_link: source_link(&channel, &raw_message),
            channel_weight: channel.importance_weight,
            item,
        })
        .collect();

    let groups = group_items(conn, &items);
    let mut clusters = make_clusters(conn, &items, groups);

    let consolidated = settings::get_bool(conn, settings::CONSOLIDATED_CLUSTERS_ENABLED, false);

    if consolidated {
        clusters = consolidate_by_topic(&items, clusters);
    }

    order_clusters(&items, &mut clusters);

    let editor_enabled = settings::get_bool(conn, settings::EDITOR_ENABLED, false);

    let narrative = if editor_enabled {
        let summaries: Vec<String> = clusters
            .iter()
            .map(|cluster| cluster.summary.clone())
            .collect();

        match llm::gateway().narrative(conn, &summaries) {
            Ok(narrative) => Some(narrative),
            Err(error) => {
                log::error!("Editorial narrative failed: {:?}", error);
                None
            }
        }
    } else {
        None
    };

    let others_narrative = if editor_enabled && !tail.is_empty() {
        let summaries: Vec<String> = tail
            .iter()
            .map(|(item, _, _)| item.summary.clone())
            .collect();

        match llm::gateway().narrative(conn, &summaries) {
            Ok(narrative) => Some(narrative),
            Err(error) => {
                log::error!("Others narrative failed: {:?}", error);
                None
            }
        }
    } else {
        None
    };

    Ok(Some(DigestPlan {
        started_at: start,
        ended_at: end,
        items,
        clusters,
        narrative,
        others_narrative,
        consolidated,
    }))
}

fn group_items(conn: &mut PgConnection, items: &[ArenaItem]) -> Vec<Vec<usize>> {
    let mode = settings::get_string(conn, settings::DEDUP_MODE, DEDUP_MODE_STRICT);

    if mode == DEDUP_MODE_SEMANTIC && items.len() > 1 {
        let summaries: Vec<String> = items
            .iter()
            .map(|arena_item| arena_item.item.summary.clone())
            .collect();

        match llm::gateway().cluster(conn, &summaries) {
            Ok(groups) => return groups,
            Err(error) => {
                log::error!("Semantic clustering failed, falling back to strict: {:?}", error);
            }
        }
    }

    strict_groups(items)
}

// Strict mode groups by canonical hash: reposts collapse, everything else
// stands alone.
pub fn strict_groups(items: &[ArenaItem]) -> Vec<Vec<usize>> {
    let mut by_hash: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut order = vec![];

    for (index, arena_item) in items.iter().enumerate() {
        let hash = arena_item.item.content_hash.as_str();

        if !by_hash.contains_key(hash) {
            order.push(hash);
        }

        by_hash.entry(hash).or_default().push(index);
    }

    order
        .into_iter()
        .map(|hash| by_hash.remove(hash).unwrap_or_default())
        .collect()
}

fn make_clusters(
    conn: &mut PgConnection,
    items: &[ArenaItem],
    groups: Vec<Vec<usize>>,
) -> Vec<ClusterPlan> {
    let mut clusters = vec![];

    for members in groups {
        if members.is_empty() {
            continue;
        }

        let representative = representative_of(items, &members);

        let summary = if members.len() > 1 {
            let summaries: Vec<String> = members
                .iter()
                .map(|member| items[*member].item.summary.clone())
                .collect();

            match llm::gateway().merge_cluster_summary(conn, &summaries) {
                Ok(summary) => summary,
                Err(error) => {
                    log::error!("Cluster summary merge failed: {:?}", error);
                    items[representative].item.summary.clone()
                }
            }
        } else {
            items[representative].item.summary.clone()
        };

        clusters.push(ClusterPlan {
            topic: items[representative].item.topic.clone(),
            summary,
            members,
            representative,
        });
    }

    clusters
}

// The highest weighted importance represents the cluster; ties go to the
// lowest item id for determinism.
pub fn representative_of(items: &[ArenaItem], members: &[usize]) -> usize {
    let mut best = members[0];

    for member in members.iter().skip(1) {
        let challenger = items[*member].weighted_importance();
        let champion = items[best].weighted_importance();

        if challenger > champion
            || (challenger == champion && items[*member].item.id < items[best].item.id)
        {
            best = *member;
        }
    }

    best
}

fn consolidate_by_topic(items: &[ArenaItem], clusters: Vec<ClusterPlan>) -> Vec<ClusterPlan> {
    let mut by_topic: HashMap<String, ClusterPlan> = HashMap::new();
    let mut consolidated = vec![];

    for cluster in clusters {
        match &cluster.topic {
            Some(topic) => match by_topic.remove(topic) {
                Some(mut merged) => {
                    merged.members.extend(cluster.members.iter());
                    merged.representative = representative_of(items, &merged.members);
                    merged.summary = format!("{}\n{}", merged.summary, cluster.summary);

                    by_topic.insert(topic.clone(), merged);
                }
                None => {
                    by_topic.insert(topic.clone(), cluster);
                }
            },
            None => consolidated.push(cluster),
        }
    }

    let mut merged: Vec<ClusterPlan> = by_topic.into_values().collect();
    merged.extend(consolidated);

    merged
}

// Digest order: bigger clusters first, then weighted importance, then
// recency, item id as the final tiebreak.
pub fn order_clusters(items: &[ArenaItem], clusters: &mut [ClusterPlan]) {
    clusters.sort_by(|a, b| {
        let a_rep = &items[a.representative];
        let b_rep = &items[b.representative];

        b.members
            .len()
            .cmp(&a.members.len())
            .then(
                b_rep
                    .weighted_importance()
                    .partial_cmp(&a_rep.weighted_importance())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(b_rep.item.tg_date.cmp(&a_rep.item.tg_date))
            .then(a_rep.item.id.cmp(&b_rep.item.id))
    });
}

fn source_link(channel: &Channel, raw_message: &RawMessage) -> Option<String> {
    if let Some(username) = &channel.username {
        return Some(format!(
            "https://t.me/{}/{}",
            username, raw_message.tg_message_id
        ));
    }

    channel.peer_id.map(|peer_id| {
        format!("https://t.me/c/{}/{}", peer_id, raw_message.tg_message_id)
    })
}

#[cfg(test)]
mod tests {
    use super::{order_clusters, representative_of, strict_groups, ArenaItem, ClusterPlan};
    use crate::db;
    use crate::db::{channels, items, raw_messages};
    use crate::models::item::STATUS_READY_PENDING;
    use crate::models::Item;
    use chrono::Duration;
    use diesel::result::Error;
    use diesel::Connection;

    fn arena_item(id: i64, hash: &str, importance: f64, weight: f64, age_minutes: i64) -> ArenaItem {
        let now = db::current_time();

        ArenaItem {
            item: Item {
                id,
                raw_id: id,
                channel_id: 1,
                summary: format!("summary {}", id),
                topic: None,
                relevance: 0.9,
                importance,
                status: "ready_pending".to_string(),
                error: None,
                drop_reason: None,
                content_hash: hash.to_string(),
                tg_date: now - Duration::minutes(age_minutes),
                created_at: now,
                updated_at: now,
            },
            channel_weight: weight,
            source_link: None,
        }
    }

    #[test]
    fn strict_groups_collapse_equal_hashes() {
        let items = vec![
            arena_item(1, "aaa", 0.5, 1.0, 10),
            arena_item(2, "bbb", 0.5, 1.0, 9),
            arena_item(3, "aaa", 0.9, 1.0, 8),
        ];

        let groups = strict_groups(&items);

        assert_eq!(groups, vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn representative_is_the_highest_weighted_importance() {
        let items = vec![
            arena_item(1, "aaa", 0.5, 1.0, 10),
            // Lower raw importance, but the channel weight lifts it.
            arena_item(2, "aaa", 0.4, 2.0, 9),
        ];

        assert_eq!(representative_of(&items, &[0, 1]), 1);
    }

    #[test]
    fn representative_ties_break_on_item_id() {
        let items = vec![
            arena_item(7, "aaa", 0.5, 1.0, 10),
            arena_item(3, "aaa", 0.5, 1.0, 9),
        ];

        assert_eq!(representative_of(&items, &[0, 1]), 1);
    }

    fn seed_ready_item(
        connection: &mut diesel::PgConnection,
        channel_id: i64,
        tg_message_id: i32,
        text: &str,
        importance: f64,
    ) -> i64 {
        let raw = raw_messages::create(
            connection,
            raw_messages::tests::build_message(channel_id, tg_message_id, text),
        )
        .unwrap()
        .unwrap();

        items::create(
            connection,
            items::NewItem {
                raw_id: raw.id,
                channel_id,
                summary: format!("summary of {}", tg_message_id),
                topic: None,
                relevance: 0.9,
                importance,
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

    // Two reposts of the same text collapse into one cluster; only the
    // representative goes into the digest.
    #[test]
    fn build_collapses_equal_hashes_into_one_cluster() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();

            seed_ready_item(
                connection,
                channel.id,
                1,
                "rust 2.0 released https://a.example/post",
                0.7,
            );
            let repost = seed_ready_item(
                connection,
                channel.id,
                2,
                "RUST 2.0  released https://b.example/mirror",
                0.9,
            );
            seed_ready_item(connection, channel.id, 3, "a completely different story", 0.8);

            let now = db::current_time();
            let plan = super::build(connection, now - Duration::hours(1), now + Duration::hours(1))
                .unwrap()
                .unwrap();

            assert_eq!(plan.clusters.len(), 2);
            assert_eq!(plan.included_item_ids().len(), 2);
            assert_eq!(plan.duplicate_item_ids().len(), 1);

            // The higher-importance repost represents its cluster.
            assert!(plan.included_item_ids().contains(&repost));
            assert!(!plan.duplicate_item_ids().contains(&repost));

            Ok(())
        });
    }

    #[test]
    fn build_skips_items_below_the_importance_threshold() {
        let mut connection = db::establish_test_connection();

        connection.test_transaction::<_, Error, _>(|connection| {
            let channel = channels::create_by_username(connection, "rustlang").unwrap();

            seed_ready_item(connection, channel.id, 1, "barely worth mentioning today", 0.1);

            let now = db::current_time();
            let plan = super::build(connection, now - Duration::hours(1), now + Duration::hours(1))
                .unwrap();

            assert!(plan.is_none());

            Ok(())
        });
    }

    #[test]
    fn clusters_order_by_size_then_importance_then_recency() {
        let items = vec![
            arena_item(1, "aaa", 0.9, 1.0, 10),
            arena_item(2, "bbb", 0.5, 1.0, 5),
            arena_item(3, "bbb", 0.5, 1.0, 4),
            arena_item(4, "ccc", 0.7, 1.0, 1),
        ];

        let mut clusters = vec![
            ClusterPlan {
                topic: None,
                summary: "a".to_string(),
                members: vec![0],
                representative: 0,
            },
            ClusterPlan {
                topic: None,
                summary: "b".to_string(),
                members: vec![1, 2],
                representative: 1,
            },
            ClusterPlan {
                topic: None,
                summary: "c".to_string(),
                members: vec![3],
                representative: 3,
            },
        ];

        order_clusters(&items, &mut clusters);

        // The two-member cluster leads, then the higher importance single.
        assert_eq!(clusters[0].summary, "b");
        assert_eq!(clusters[1].summary, "a");
        assert_eq!(clusters[2].summary, "c");
    }
}
