use crate::config::Config;
use crate::db;
use crate::http_client;
use grammers_client::types::{Downloadable, Message};
use grammers_client::Client;
use isahc::Request;
use regex::Regex;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;
use tokio::sync::Semaphore;

const MAX_CONCURRENT_DOWNLOADS: usize = 5;

static DOWNLOAD_SEMAPHORE: OnceLock<Arc<Semaphore>> = OnceLock::new();
static LINK_REGEX: OnceLock<Regex> = OnceLock::new();

fn download_semaphore() -> Arc<Semaphore> {
    DOWNLOAD_SEMAPHORE
        .get_or_init(|| Arc::new(Semaphore::new(MAX_CONCURRENT_DOWNLOADS)))
        .clone()
}

fn link_regex() -> &'static Regex {
    LINK_REGEX.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

// Media arrives in the background; a failed download leaves the raw message
// intact without media.
pub fn spawn_download(client: Client, message: Message, raw_id: i64) {
    tokio::spawn(async move {
        let permit = match download_semaphore().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let result = download(&client, &message, raw_id).await;
        drop(permit);

        if let Err(msg) = result {
            log::error!("Failed to download media for raw message {}: {}", raw_id, msg);
        }
    });
}

async fn download(client: &Client, message: &Message, raw_id: i64) -> Result<(), String> {
    let media = match message.media() {
        Some(media) => media,
        None => return Ok(()),
    };

    let dir = PathBuf::from(Config::media_dir());

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|error| format!("{:?}", error))?;

    let path = dir.join(format!("{}.bin", raw_id));

    client
        .download_media(&Downloadable::Media(media.clone()), &path)
        .await
        .map_err(|error| format!("{:?}", error))?;

    let blob = json!({
        "kind": media_kind(&media),
        "path": path.to_string_lossy(),
    });

    let mut connection = db::pool()
        .get()
        .map_err(|error| format!("{:?}", error))?;

    db::raw_messages::set_media(&mut connection, raw_id, blob)
        .map_err(|error| format!("{:?}", error))?;

    Ok(())
}

fn media_kind(media: &grammers_client::types::Media) -> &'static str {
    use grammers_client::types::Media;

    match media {
        Media::Photo(_) => "photo",
        Media::Document(_) => "document",
        Media::Sticker(_) => "sticker",
        Media::Contact(_) => "contact",
        Media::Poll(_) => "poll",
        Media::Geo(_) => "geo",
        Media::Venue(_) => "venue",
        Media::Dice(_) => "dice",
        Media::WebPage(_) => "webpage",
        _ => "other",
    }
}

// Resolves the first external link so the digest can show where a short
// URL actually leads.
pub fn spawn_link_resolution(raw_id: i64, text: &str) {
    let url = match first_external_link(text) {
        Some(url) => url,
        None => return,
    };

    tokio::task::spawn_blocking(move || {
        let request = match Request::head(&url).body(()) {
            Ok(request) => request,
            Err(error) => {
                log::error!("Failed to build link request {}: {:?}", url, error);
                return;
            }
        };

        let status = match http_client::client().send(request) {
            Ok(response) => response.status().as_u16(),
            Err(error) => {
                log::error!("Failed to resolve link {}: {:?}", url, error);
                return;
            }
        };

        let blob = json!({ "url": url, "status": status });

        let mut connection = match db::pool().get() {
            Ok(connection) => connection,
            Err(error) => {
                log::error!("Failed to fetch a connection from the pool {:?}", error);
                return;
            }
        };

        if let Err(error) = db::raw_messages::set_link_preview(&mut connection, raw_id, blob) {
            log::error!("Failed to store link preview for {}: {:?}", raw_id, error);
        }
    });
}

pub fn first_external_link(text: &str) -> Option<String> {
    link_regex()
        .find_iter(text)
        .map(|found| found.as_str().trim_end_matches([')', ']', '.', ',']))
        .find(|url| !url.contains("t.me/"))
        .map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::first_external_link;

    #[test]
    fn skips_telegram_links() {
        let text = "see https://t.me/channel and https://example.com/article.";

        assert_eq!(
            first_external_link(text),
            Some("https://example.com/article".to_string())
        );
    }

    #[test]
    fn returns_none_without_links() {
        assert_eq!(first_external_link("plain text"), None);
    }
}
