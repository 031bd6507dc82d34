use super::discovery;
use super::hash;
use super::media;
use super::ReaderError;
use crate::config::Config;
use crate::db;
use crate::db::raw_messages::NewRawMessage;
use crate::models::Channel;
use grammers_client::types::Message;
use grammers_client::Client;
use grammers_client::InvocationError;
use grammers_session::{PackedChat, PackedType};
use grammers_tl_types as tl;
use rand::Rng;
use serde_json::json;
use serde_json::Value;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

pub async fn fetch_channel(
    client: &Client,
    channel: &Channel,
    token: &CancellationToken,
) -> Result<usize, ReaderError> {
    rate_limit_delay(token).await;

    if token.is_cancelled() {
        return Ok(0);
    }

    let channel = ensure_joined(client, channel).await?;
    let (channel, packed) = resolve_peer(client, &channel).await?;

    let messages = fetch_history(client, &channel, packed).await?;

    let mut stored = 0;
    let mut max_id = channel.last_tg_message_id;

    for message in &messages {
        max_id = max_id.max(message.id());

        if store_message(client, &channel, message).await? {
            stored += 1;
        }
    }

    let mut connection = db::pool().get().map_err(super::pool_error)?;

    db::channels::advance_last_tg_message_id(&mut connection, &channel, max_id)?;
    db::channels::reset_error(&mut connection, &channel)?;

    Ok(stored)
}

// Every worker waits at least 1/rps, plus up to half of that again, so
// parallel workers do not fire at Telegram in lockstep.
async fn rate_limit_delay(token: &CancellationToken) {
    let base = 1.0 / Config::rate_limit_rps().max(0.001);
    let jitter = {
        let mut rng = rand::thread_rng();
        rng.gen_range(0.0..0.5)
    };

    let delay = Duration::from_secs_f64(base * (1.0 + jitter));

    tokio::select! {
        _ = token.cancelled() => (),
        _ = sleep(delay) => (),
    }
}

// Invite-only channels have to be joined before their history is readable.
async fn ensure_joined(client: &Client, channel: &Channel) -> Result<Channel, ReaderError> {
    if channel.peer_id.is_some() || channel.username.is_some() {
        return Ok(channel.clone());
    }

    let invite_link = match &channel.invite_link {
        Some(invite_link) => invite_link.clone(),
        None => {
            return Err(ReaderError {
                msg: "channel has no username, peer or invite link".to_string(),
            })
        }
    };

    let invite_hash = match discovery::invite_hash_from_url(&invite_link) {
        Some(invite_hash) => invite_hash,
        None => {
            return Err(ReaderError {
                msg: format!("unparsable invite link {}", invite_link),
            })
        }
    };

    match client
        .invoke(&tl::functions::messages::ImportChatInvite {
            hash: invite_hash.clone(),
        })
        .await
    {
        Ok(updates) => apply_invite_chats(channel, chats_from_updates(updates)),
        Err(InvocationError::Rpc(rpc)) if rpc.name == "USER_ALREADY_PARTICIPANT" => {
            let invite = client
                .invoke(&tl::functions::messages::CheckChatInvite { hash: invite_hash })
                .await
                .map_err(invocation_error)?;

            match invite {
                tl::enums::ChatInvite::Already(already) => {
                    apply_invite_chats(channel, vec![already.chat])
                }
                _ => Err(ReaderError {
                    msg: "invite re-check did not return a chat".to_string(),
                }),
            }
        }
        Err(error) => Err(invocation_error(error)),
    }
}

fn chats_from_updates(updates: tl::enums::Updates) -> Vec<tl::enums::Chat> {
    match updates {
        tl::enums::Updates::Updates(updates) => updates.chats,
        tl::enums::Updates::Combined(updates) => updates.chats,
        _ => vec![],
    }
}

fn apply_invite_chats(
    channel: &Channel,
    chats: Vec<tl::enums::Chat>,
) -> Result<Channel, ReaderError> {
    let mut connection = db::pool().get().map_err(super::pool_error)?;

    for chat in chats {
        if let tl::enums::Chat::Channel(chat) = chat {
            let updated = db::channels::set_resolved(
                &mut connection,
                channel,
                chat.id,
                chat.access_hash.unwrap_or(0),
                Some(chat.title.clone()),
                None,
                chat.username.clone(),
            )?;

            return Ok(updated);
        }
    }

    Err(ReaderError {
        msg: "invite did not resolve to a channel".to_string(),
    })
}

async fn resolve_peer(
    client: &Client,
    channel: &Channel,
) -> Result<(Channel, PackedChat), ReaderError> {
    if let (Some(peer_id), Some(access_hash)) = (channel.peer_id, channel.access_hash) {
        let packed = PackedChat {
            ty: PackedType::Broadcast,
            id: peer_id,
            access_hash: Some(access_hash),
        };

        return Ok((channel.clone(), packed));
    }

    let username = match &channel.username {
        Some(username) => username.clone(),
        None => {
            return Err(ReaderError {
                msg: "channel has neither a cached peer nor a username".to_string(),
            })
        }
    };

    let chat = client
        .resolve_username(&username)
        .await
        .map_err(invocation_error)?
        .ok_or(ReaderError {
            msg: format!("username @{} did not resolve", username),
        })?;

    let packed = chat.pack();

    let mut connection = db::pool().get().map_err(super::pool_error)?;

    let updated = db::channels::set_resolved(
        &mut connection,
        channel,
        packed.id,
        packed.access_hash.unwrap_or(0),
        Some(chat.name().to_string()),
        None,
        chat.username().map(|name| name.to_string()),
    )?;

    Ok((updated, packed))
}

// History comes newest first; collect everything above the high-water mark
// and flip it into arrival order. A flood wait blocks only this worker, and
// only once.
async fn fetch_history(
    client: &Client,
    channel: &Channel,
    packed: PackedChat,
) -> Result<Vec<Message>, ReaderError> {
    match try_fetch_history(client, channel, packed).await {
        Ok(messages) => Ok(messages),
        Err(error) => match flood_wait_seconds(&error) {
            Some(seconds) => {
                log::info!(
                    "Flood wait of {}s for channel {}",
                    seconds,
                    channel.display_name()
                );

                sleep(Duration::from_secs(seconds as u64)).await;

                try_fetch_history(client, channel, packed)
                    .await
                    .map_err(invocation_error)
            }
            None => Err(invocation_error(error)),
        },
    }
}

async fn try_fetch_history(
    client: &Client,
    channel: &Channel,
    packed: PackedChat,
) -> Result<Vec<Message>, InvocationError> {
    let limit = Config::reader_fetch_limit();
    let mut iter = client.iter_messages(packed).limit(limit);
    let mut messages = vec![];

    while let Some(message) = iter.next().await? {
        if message.id() <= channel.last_tg_message_id {
            break;
        }

        messages.push(message);
    }

    messages.reverse();

    Ok(messages)
}

fn flood_wait_seconds(error: &InvocationError) -> Option<u32> {
    match error {
        InvocationError::Rpc(rpc) if rpc.name.starts_with("FLOOD_WAIT") => {
            Some(rpc.value.unwrap_or(30))
        }
        _ => None,
    }
}

async fn store_message(
    client: &Client,
    channel: &Channel,
    message: &Message,
) -> Result<bool, ReaderError> {
    let text = message.text().to_string();
    let has_media = message.media().is_some();

    // Service messages still feed discovery extraction below.
    let stored = if !text.is_empty() || has_media {
        let new_message = NewRawMessage {
            channel_id: channel.id,
            tg_message_id: message.id(),
            tg_date: message.date(),
            text: text.clone(),
            entities: entities_blob(&message.raw),
            media: None,
            content_hash: hash::canonical_hash(&text),
            is_forward: message.raw.fwd_from.is_some(),
            views: message.raw.views.unwrap_or(0),
            forwards: message.raw.forwards.unwrap_or(0),
        };

        let mut connection = db::pool().get().map_err(super::pool_error)?;

        db::raw_messages::create(&mut connection, new_message)?
    } else {
        None
    };

    if let Some(raw_message) = &stored {
        if has_media {
            media::spawn_download(client.clone(), message.clone(), raw_message.id);
        }

        media::spawn_link_resolution(raw_message.id, &text);

        let extract_now = {
            let mut connection = db::pool().get().map_err(super::pool_error)?;
            db::raw_messages::mark_discovery_extracted(&mut connection, raw_message.id)?
        };

        if extract_now {
            discovery::extract_and_store(channel, message);
        }
    } else if message.raw_action.is_some() {
        discovery::extract_and_store(channel, message);
    }

    Ok(stored.is_some())
}

fn entities_blob(raw: &tl::types::Message) -> Option<Value> {
    let entities = raw.entities.as_ref()?;

    let mut blobs = vec![];

    for entity in entities {
        match entity {
            tl::enums::MessageEntity::Mention(mention) => blobs.push(json!({
                "kind": "mention",
                "offset": mention.offset,
                "length": mention.length,
            })),
            tl::enums::MessageEntity::Url(url) => blobs.push(json!({
                "kind": "url",
                "offset": url.offset,
                "length": url.length,
            })),
            tl::enums::MessageEntity::TextUrl(text_url) => blobs.push(json!({
                "kind": "text_url",
                "offset": text_url.offset,
                "length": text_url.length,
                "url": text_url.url,
            })),
            tl::enums::MessageEntity::MentionName(mention) => blobs.push(json!({
                "kind": "mention_name",
                "offset": mention.offset,
                "length": mention.length,
                "user_id": mention.user_id,
            })),
            tl::enums::MessageEntity::Hashtag(hashtag) => blobs.push(json!({
                "kind": "hashtag",
                "offset": hashtag.offset,
                "length": hashtag.length,
            })),
            tl::enums::MessageEntity::CustomEmoji(emoji) => blobs.push(json!({
                "kind": "custom_emoji",
                "offset": emoji.offset,
                "length": emoji.length,
                "document_id": emoji.document_id,
            })),
            // Styling entities are irrelevant downstream.
            _ => (),
        }
    }

    if blobs.is_empty() {
        None
    } else {
        Some(json!(blobs))
    }
}

fn invocation_error(error: InvocationError) -> ReaderError {
    ReaderError {
        msg: format!("{:?}", error),
    }
}

