use super::ReaderError;
use crate::db;
use crate::db::discoveries::NewDiscovery;
use crate::models::{Channel, Discovery};
use grammers_client::types::Message;
use grammers_client::Client;
use grammers_tl_types as tl;
use regex::Regex;
use std::sync::OnceLock;

static TME_REGEX: OnceLock<Regex> = OnceLock::new();
static MENTION_REGEX: OnceLock<Regex> = OnceLock::new();

// Paths on t.me that are features, not channel usernames.
const RESERVED_TME_PATHS: [&str; 6] = ["c", "s", "share", "proxy", "socks", "addstickers"];

fn tme_regex() -> &'static Regex {
    TME_REGEX.get_or_init(|| {
        Regex::new(r"(?:https?://)?(?:t|telegram)\.me/(\+?[A-Za-z0-9_/+-]+)").unwrap()
    })
}

fn mention_regex() -> &'static Regex {
    MENTION_REGEX.get_or_init(|| Regex::new(r"@([A-Za-z][A-Za-z0-9_]{3,31})").unwrap())
}

pub fn username_from_tme_url(url: &str) -> Option<String> {
    let captures = tme_regex().captures(url)?;
    let path = captures.get(1)?.as_str();

    if path.starts_with('+') || path.starts_with("joinchat/") {
        return None;
    }

    let first_segment = path.split('/').next()?;

    if first_segment.is_empty() || RESERVED_TME_PATHS.contains(&first_segment) {
        return None;
    }

    Some(first_segment.to_lowercase())
}

pub fn invite_hash_from_url(url: &str) -> Option<String> {
    let captures = tme_regex().captures(url)?;
    let path = captures.get(1)?.as_str();

    if let Some(hash) = path.strip_prefix('+') {
        let hash = hash.split('/').next()?;
        return (!hash.is_empty()).then(|| hash.to_string());
    }

    if let Some(hash) = path.strip_prefix("joinchat/") {
        let hash = hash.split('/').next()?;
        return (!hash.is_empty()).then(|| hash.to_string());
    }

    None
}

pub fn discoveries_from_text(text: &str, engagement: i64) -> Vec<NewDiscovery> {
    let mut found = vec![];

    for captures in tme_regex().captures_iter(text) {
        let url = captures.get(0).map(|whole| whole.as_str()).unwrap_or("");

        if let Some(username) = username_from_tme_url(url) {
            found.push(NewDiscovery {
                source_type: "link".to_string(),
                username: Some(username),
                peer_id: None,
                invite_hash: None,
                title: None,
                engagement,
            });
        } else if let Some(invite_hash) = invite_hash_from_url(url) {
            found.push(NewDiscovery {
                source_type: "link".to_string(),
                username: None,
                peer_id: None,
                invite_hash: Some(invite_hash),
                title: None,
                engagement,
            });
        }
    }

    for captures in mention_regex().captures_iter(text) {
        if let Some(username) = captures.get(1) {
            found.push(NewDiscovery {
                source_type: "mention".to_string(),
                username: Some(username.as_str().to_lowercase()),
                peer_id: None,
                invite_hash: None,
                title: None,
                engagement,
            });
        }
    }

    found
}

pub fn extract_and_store(channel: &Channel, message: &Message) {
    let candidates = extract(channel, message);

    if candidates.is_empty() {
        return;
    }

    let mut connection = match db::pool().get() {
        Ok(connection) => connection,
        Err(error) => {
            log::error!("Failed to fetch a connection from the pool {:?}", error);
            return;
        }
    };

    for candidate in candidates {
        if let Err(error) = db::discoveries::upsert(&mut connection, candidate) {
            log::error!("Failed to store a discovery: {:?}", error);
        }
    }
}

pub fn extract(channel: &Channel, message: &Message) -> Vec<NewDiscovery> {
    let raw = &message.raw;
    let engagement = raw.views.unwrap_or(0) as i64 + 2 * raw.forwards.unwrap_or(0) as i64;
    let mut found = vec![];

    // Forward origin.
    if let Some(tl::enums::MessageFwdHeader::Header(header)) = &raw.fwd_from {
        if let Some(peer) = &header.from_id {
            push_peer(&mut found, "forward", peer, engagement);
        }

        if let Some(peer) = &header.saved_from_peer {
            push_peer(&mut found, "forward", peer, engagement);
        }
    }

    // Reply header.
    if let Some(tl::enums::MessageReplyHeader::Header(header)) = &raw.reply_to {
        if let Some(peer) = &header.reply_to_peer_id {
            push_peer(&mut found, "reply", peer, engagement);
        }
    }

    // t.me links and @mentions in the text body.
    found.extend(discoveries_from_text(&raw.message, engagement));

    // Typed entities carry references the plain text scan cannot see.
    if let Some(entities) = &raw.entities {
        for entity in entities {
            match entity {
                tl::enums::MessageEntity::TextUrl(text_url) => {
                    found.extend(discoveries_from_url(
                        "entity_text_url",
                        &text_url.url,
                        engagement,
                    ));
                }
                tl::enums::MessageEntity::MentionName(mention) => {
                    found.push(NewDiscovery {
                        source_type: "mention".to_string(),
                        username: None,
                        peer_id: Some(mention.user_id),
                        invite_hash: None,
                        title: None,
                        engagement,
                    });
                }
                _ => (),
            }
        }
    }

    // Inline keyboards.
    if let Some(tl::enums::ReplyMarkup::ReplyInlineMarkup(markup)) = &raw.reply_markup {
        for row in &markup.rows {
            let tl::enums::KeyboardButtonRow::Row(row) = row;

            for button in &row.buttons {
                match button {
                    tl::enums::KeyboardButton::Url(button) => {
                        found.extend(discoveries_from_url("button", &button.url, engagement));
                    }
                    tl::enums::KeyboardButton::WebView(button) => {
                        found.extend(discoveries_from_url("button", &button.url, engagement));
                    }
                    tl::enums::KeyboardButton::UserProfile(button) => {
                        found.push(NewDiscovery {
                            source_type: "button".to_string(),
                            username: None,
                            peer_id: Some(button.user_id),
                            invite_hash: None,
                            title: None,
                            engagement,
                        });
                    }
                    _ => (),
                }
            }
        }
    }

    // Media payloads.
    if let Some(media) = &raw.media {
        extract_from_media(&mut found, media, engagement);
    }

    // Reactions expose the peers that reacted.
    if let Some(tl::enums::MessageReactions::Reactions(reactions)) = &raw.reactions {
        if let Some(recent) = &reactions.recent_reactions {
            for reaction in recent {
                let tl::enums::MessagePeerReaction::Reaction(reaction) = reaction;

                push_peer(&mut found, "reaction", &reaction.peer_id, engagement);
            }
        }
    }

    if let Some(via_bot_id) = raw.via_bot_id {
        found.push(NewDiscovery {
            source_type: "via_bot".to_string(),
            username: None,
            peer_id: Some(via_bot_id),
            invite_hash: None,
            title: None,
            engagement,
        });
    }

    if let Some(action) = &message.raw_action {
        extract_from_action(&mut found, action, engagement);
    }

    // Never rediscover the channel being read.
    found.retain(|candidate| {
        candidate.peer_id != channel.peer_id
            && (candidate.username.is_none() || candidate.username != channel.username)
    });

    found
}

fn extract_from_media(
    found: &mut Vec<NewDiscovery>,
    media: &tl::enums::MessageMedia,
    engagement: i64,
) {
    match media {
        tl::enums::MessageMedia::WebPage(media) => {
            if let tl::enums::WebPage::Page(page) = &media.webpage {
                found.extend(discoveries_from_url("webpage", &page.url, engagement));
            }
        }
        tl::enums::MessageMedia::Giveaway(giveaway) => {
            for channel_id in &giveaway.channels {
                found.push(NewDiscovery {
                    source_type: "giveaway".to_string(),
                    username: None,
                    peer_id: Some(*channel_id),
                    invite_hash: None,
                    title: None,
                    engagement,
                });
            }
        }
        tl::enums::MessageMedia::Story(story) => {
            push_peer(found, "story", &story.peer, engagement);
        }
        tl::enums::MessageMedia::Poll(poll) => {
            let tl::enums::PollResults::Results(results) = &poll.results;

            if let Some(voters) = &results.recent_voters {
                for voter in voters {
                    push_peer(found, "poll", voter, engagement);
                }
            }
        }
        tl::enums::MessageMedia::Contact(contact) => {
            found.push(NewDiscovery {
                source_type: "contact".to_string(),
                username: None,
                peer_id: Some(contact.user_id),
                invite_hash: None,
                title: None,
                engagement,
            });
        }
        _ => (),
    }
}

fn extract_from_action(
    found: &mut Vec<NewDiscovery>,
    action: &tl::enums::MessageAction,
    engagement: i64,
) {
    match action {
        tl::enums::MessageAction::ChatMigrateTo(action) => {
            found.push(peer_id_discovery("migration", action.channel_id, engagement));
        }
        tl::enums::MessageAction::ChannelMigrateFrom(action) => {
            found.push(peer_id_discovery("migration", action.chat_id, engagement));
        }
        tl::enums::MessageAction::ChatJoinedByLink(action) => {
            found.push(peer_id_discovery("join", action.inviter_id, engagement));
        }
        tl::enums::MessageAction::ChatAddUser(action) => {
            for user_id in &action.users {
                found.push(peer_id_discovery("join", *user_id, engagement));
            }
        }
        tl::enums::MessageAction::InviteToGroupCall(action) => {
            for user_id in &action.users {
                found.push(peer_id_discovery("group_call", *user_id, engagement));
            }
        }
        tl::enums::MessageAction::GiftCode(action) => {
            if let Some(peer) = &action.boost_peer {
                push_peer(found, "gift_code", peer, engagement);
            }
        }
        tl::enums::MessageAction::RequestedPeer(action) => {
            for peer in &action.peers {
                push_peer(found, "requested_peer", peer, engagement);
            }
        }
        _ => (),
    }
}

fn discoveries_from_url(source_type: &str, url: &str, engagement: i64) -> Vec<NewDiscovery> {
    let mut found = vec![];

    if let Some(username) = username_from_tme_url(url) {
        found.push(NewDiscovery {
            source_type: source_type.to_string(),
            username: Some(username),
            peer_id: None,
            invite_hash: None,
            title: None,
            engagement,
        });
    } else if let Some(invite_hash) = invite_hash_from_url(url) {
        found.push(NewDiscovery {
            source_type: source_type.to_string(),
            username: None,
            peer_id: None,
            invite_hash: Some(invite_hash),
            title: None,
            engagement,
        });
    }

    found
}

fn push_peer(found: &mut Vec<NewDiscovery>, source_type: &str, peer: &tl::enums::Peer, engagement: i64) {
    let peer_id = match peer {
        tl::enums::Peer::Channel(peer) => peer.channel_id,
        tl::enums::Peer::Chat(peer) => peer.chat_id,
        tl::enums::Peer::User(peer) => peer.user_id,
    };

    found.push(peer_id_discovery(source_type, peer_id, engagement));
}

fn peer_id_discovery(source_type: &str, peer_id: i64, engagement: i64) -> NewDiscovery {
    NewDiscovery {
        source_type: source_type.to_string(),
        username: None,
        peer_id: Some(peer_id),
        invite_hash: None,
        title: None,
        engagement,
    }
}

// A peer-only discovery cannot be fetched without an access hash; asking
// Telegram for the bare id at least recovers the username when the peer is
// public.
pub async fn resolve_peer_discovery(
    client: &Client,
    discovery: &Discovery,
) -> Result<(), ReaderError> {
    let peer_id = match discovery.peer_id {
        Some(peer_id) => peer_id,
        None => return Ok(()),
    };

    let request = tl::functions::channels::GetChannels {
        id: vec![tl::enums::InputChannel::Channel(tl::types::InputChannel {
            channel_id: peer_id,
            access_hash: 0,
        })],
    };

    let chats = match client.invoke(&request).await {
        Ok(tl::enums::messages::Chats::Chats(chats)) => chats.chats,
        Ok(tl::enums::messages::Chats::Slice(chats)) => chats.chats,
        Err(error) => {
            return Err(ReaderError {
                msg: format!("{:?}", error),
            })
        }
    };

    let mut connection = db::pool().get().map_err(super::pool_error)?;

    for chat in chats {
        if let tl::enums::Chat::Channel(chat) = chat {
            db::discoveries::set_resolved(
                &mut connection,
                discovery,
                chat.username.clone(),
                Some(chat.title.clone()),
            )?;
        }
    }

    Ok(())
}

pub async fn resolve_invite_discovery(
    client: &Client,
    discovery: &Discovery,
) -> Result<(), ReaderError> {
    let invite_hash = match &discovery.invite_hash {
        Some(invite_hash) => invite_hash.clone(),
        None => return Ok(()),
    };

    let invite = client
        .invoke(&tl::functions::messages::CheckChatInvite { hash: invite_hash })
        .await
        .map_err(|error| ReaderError {
            msg: format!("{:?}", error),
        })?;

    let mut connection = db::pool().get().map_err(super::pool_error)?;

    match invite {
        tl::enums::ChatInvite::Invite(invite) => {
            db::discoveries::set_resolved(
                &mut connection,
                discovery,
                None,
                Some(invite.title.clone()),
            )?;
        }
        tl::enums::ChatInvite::Already(already) => {
            if let tl::enums::Chat::Channel(chat) = &already.chat {
                db::discoveries::set_resolved(
                    &mut connection,
                    discovery,
                    chat.username.clone(),
                    Some(chat.title.clone()),
                )?;
            }
        }
        _ => (),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{discoveries_from_text, invite_hash_from_url, username_from_tme_url};

    #[test]
    fn username_from_tme_url_handles_variants() {
        assert_eq!(
            username_from_tme_url("https://t.me/RustLang"),
            Some("rustlang".to_string())
        );
        assert_eq!(
            username_from_tme_url("t.me/rustlang/123"),
            Some("rustlang".to_string())
        );
        assert_eq!(username_from_tme_url("https://t.me/+AbCdEf123"), None);
        assert_eq!(username_from_tme_url("https://t.me/c/1234/56"), None);
    }

    #[test]
    fn invite_hash_from_url_handles_both_forms() {
        assert_eq!(
            invite_hash_from_url("https://t.me/+AbCdEf123"),
            Some("AbCdEf123".to_string())
        );
        assert_eq!(
            invite_hash_from_url("https://t.me/joinchat/XyZ-123"),
            Some("XyZ-123".to_string())
        );
        assert_eq!(invite_hash_from_url("https://t.me/rustlang"), None);
    }

    #[test]
    fn discoveries_from_text_finds_links_and_mentions() {
        let text = "via @NewsBot, more at https://t.me/rustlang and https://t.me/+secret";

        let found = discoveries_from_text(text, 5);

        assert_eq!(found.len(), 3);
        assert_eq!(found[0].username, Some("rustlang".to_string()));
        assert_eq!(found[1].invite_hash, Some("secret".to_string()));
        assert_eq!(found[2].username, Some("newsbot".to_string()));
        assert!(found.iter().all(|candidate| candidate.engagement == 5));
    }
}
