use super::builder::DigestPlan;
use super::render;
use super::split;
use super::DigestError;
use crate::bot::telegram_client::Api;
use crate::db;
use crate::db::settings;
use crate::llm;
use crate::models::Digest;
use diesel::PgConnection;
use std::time::Duration;

// Telegram throttles channels around one message per second; half a second
// between parts keeps a long digest under the limit.
const INTER_PART_DELAY: Duration = Duration::from_millis(500);

pub fn post(conn: &mut PgConnection, plan: DigestPlan) -> Result<Digest, DigestError> {
    let chat_id = settings::digest_channel_id(conn).ok_or(DigestError {
        msg: "digest channel is not configured".to_string(),
    })?;

    let item_ids = plan.included_item_ids();
    let digest = db::digests::create(conn, plan.started_at, plan.ended_at, &item_ids)?;

    for cluster in &plan.clusters {
        let member_ids: Vec<i64> = cluster
            .members
            .iter()
            .map(|member| plan.items[*member].item.id)
            .collect();

        db::clusters::create(
            conn,
            digest.id,
            cluster.topic.clone(),
            Some(cluster.summary.clone()),
            &member_ids,
        )?;
    }

    let html = render::render(&plan);
    let parts = split::split_html(&html, split::TELEGRAM_MESSAGE_LIMIT);
    let api = Api::default();

    maybe_send_cover(conn, &api, chat_id, &plan);

    let preview_enabled = settings::get_bool(conn, settings::DIGEST_INLINE_IMAGES, false);

    let mut first_message_id = None;
    let total = parts.len();

    for (index, part) in parts.iter().enumerate() {
        let reply_markup = if index + 1 == total {
            Some(Api::vote_keyboard(digest.id))
        } else {
            None
        };

        match api.send_html_message(chat_id, part, preview_enabled, reply_markup) {
            Ok(message) => {
                if first_message_id.is_none() {
                    first_message_id = Some(message.message_id);
                }
            }
            Err(error) => {
                let msg = format!("{:?}", error);

                db::digests::set_error(conn, digest.id, &msg)?;

                return Err(DigestError { msg });
            }
        }

        if index + 1 < total {
            std::thread::sleep(INTER_PART_DELAY);
        }
    }

    db::items::mark_digested(conn, &item_ids)?;
    db::items::mark_duplicates(conn, &plan.duplicate_item_ids())?;

    let digest =
        db::digests::mark_posted(conn, digest.id, chat_id, first_message_id.unwrap_or(0))?;

    log::info!(
        "Posted digest {} with {} items in {} parts",
        digest.id,
        item_ids.len(),
        total
    );

    Ok(digest)
}

// Cover failures downgrade the digest to text-only.
fn maybe_send_cover(conn: &mut PgConnection, api: &Api, chat_id: i64, plan: &DigestPlan) {
    if !settings::get_bool(conn, settings::DIGEST_AI_COVER, false) {
        return;
    }

    let url = match llm::gateway().generate_digest_cover(
        conn,
        &plan.topics(),
        plan.narrative.as_deref(),
    ) {
        Ok(url) => url,
        Err(error) => {
            log::error!("Cover generation failed: {:?}", error);
            return;
        }
    };

    if let Err(error) = api.send_photo_url(chat_id, &url, None) {
        log::error!("Failed to send the cover: {:?}", error);
    }
}
