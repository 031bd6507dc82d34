use super::builder::DigestPlan;
use crate::config::Config;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

// Renders the digest into Telegram-safe HTML. Only <b>, <i>, <code>, <a>,
// <blockquote> and <pre> survive to the wire; everything user-supplied is
// escaped.
pub fn render(plan: &DigestPlan) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "<b>Digest — {}</b>\n",
        plan.ended_at.format("%Y-%m-%d %H:%M UTC")
    ));

    if let Some(narrative) = &plan.narrative {
        output.push_str(&format!("<blockquote>{}</blockquote>\n", escape(narrative)));
    }

    for cluster in &plan.clusters {
        output.push('\n');

        if plan.consolidated {
            if let Some(topic) = &cluster.topic {
                output.push_str(&format!("<b>{}</b>\n", escape(topic)));
            }
        }

        let lines: Vec<&str> = cluster
            .summary
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();

        for (index, line) in lines.iter().enumerate() {
            output.push_str(&format!("• {}", escape(line)));

            if index + 1 < lines.len() {
                output.push('\n');
            }
        }

        let representative = &plan.items[cluster.representative];

        if let Some(link) = &representative.source_link {
            output.push_str(&format!(" <a href=\"{}\">source</a>", escape(link)));
        }

        if let Some(expanded) = expanded_view_url(representative.item.id) {
            output.push_str(&format!(" · <a href=\"{}\">more</a>", escape(&expanded)));
        }

        if cluster.members.len() > 1 {
            output.push_str(&format!(" <i>({} posts)</i>", cluster.members.len()));
        }

        output.push('\n');
    }

    if let Some(others) = &plan.others_narrative {
        output.push_str(&format!("\n<i>Also: {}</i>\n", escape(others)));
    }

    output
}

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// Expanded-view links are signed so the dashboard can trust the item id
// without a database round trip.
pub fn expanded_view_url(item_id: i64) -> Option<String> {
    let base_url = Config::expanded_view_base_url()?;
    let secret = Config::expanded_view_secret()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("item:{}", item_id).as_bytes());

    let signature = hex::encode(mac.finalize().into_bytes());

    Some(format!(
        "{}/items/{}?sig={}",
        base_url.trim_end_matches('/'),
        item_id,
        signature
    ))
}

#[cfg(test)]
mod tests {
    use super::super::builder::{ArenaItem, ClusterPlan, DigestPlan};
    use super::{escape, render};
    use crate::db;
    use crate::models::Item;

    fn plan_with(summary: &str, link: Option<&str>) -> DigestPlan {
        let now = db::current_time();

        let item = Item {
            id: 1,
            raw_id: 1,
            channel_id: 1,
            summary: summary.to_string(),
            topic: Some("ai".to_string()),
            relevance: 0.9,
            importance: 0.9,
            status: "ready_pending".to_string(),
            error: None,
            drop_reason: None,
            content_hash: "hash".to_string(),
            tg_date: now,
            created_at: now,
            updated_at: now,
        };

        DigestPlan {
            started_at: now,
            ended_at: now,
            items: vec![ArenaItem {
                item,
                channel_weight: 1.0,
                source_link: link.map(|link| link.to_string()),
            }],
            clusters: vec![ClusterPlan {
                topic: Some("ai".to_string()),
                summary: summary.to_string(),
                members: vec![0],
                representative: 0,
            }],
            narrative: None,
            others_narrative: None,
            consolidated: false,
        }
    }

    #[test]
    fn escape_covers_the_html_specials() {
        assert_eq!(
            escape("a <b> & \"c\""),
            "a &lt;b&gt; &amp; &quot;c&quot;"
        );
    }

    #[test]
    fn render_escapes_summaries_and_links_sources() {
        let plan = plan_with("1 < 2 news", Some("https://t.me/rustlang/5"));

        let output = render(&plan);

        assert!(output.contains("• 1 &lt; 2 news"));
        assert!(output.contains("<a href=\"https://t.me/rustlang/5\">source</a>"));
    }

    #[test]
    fn render_shows_cluster_sizes() {
        let mut plan = plan_with("news", None);
        plan.clusters[0].members = vec![0, 0, 0];

        let output = render(&plan);

        assert!(output.contains("(3 posts)"));
    }

    #[test]
    fn narrative_renders_as_blockquote() {
        let mut plan = plan_with("news", None);
        plan.narrative = Some("the week in one line".to_string());

        let output = render(&plan);

        assert!(output.contains("<blockquote>the week in one line</blockquote>"));
    }
}
