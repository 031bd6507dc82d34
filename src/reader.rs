use crate::config::Config;
use crate::db;
use crate::models::Channel;
use crate::shutdown;
use grammers_client::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

pub mod channel_fetcher;
pub mod client;
pub mod discovery;
pub mod hash;
pub mod media;

const SLEEP_WITH_UPDATES: Duration = Duration::from_secs(15);
const SLEEP_WITHOUT_UPDATES: Duration = Duration::from_secs(30);
const MAX_CHANNEL_WORKERS: usize = 10;
const DISCOVERY_RESOLVE_BATCH: i64 = 10;

#[derive(Debug)]
pub struct ReaderError {
    pub msg: String,
}

impl From<diesel::result::Error> for ReaderError {
    fn from(error: diesel::result::Error) -> Self {
        let msg = format!("{:?}", error);

        ReaderError { msg }
    }
}

pub fn start() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("reader-pool")
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let token = shutdown::shutdown_token();

        let client = match client::connect().await {
            Ok(client) => client,
            Err(error) => {
                log::error!("Failed to start the reader: {}", error.msg);
                return;
            }
        };

        run_loop(client, token).await;
    });
}

pub async fn run_loop(client: Client, token: CancellationToken) {
    log::info!("Starting the reader loop");

    loop {
        if token.is_cancelled() {
            log::info!("Reader canceled, shutting down cleanly");
            return;
        }

        let new_messages = match run_cycle(&client, &token).await {
            Ok(new_messages) => new_messages,
            Err(error) => {
                log::error!("Reader cycle failed: {}", error.msg);
                0
            }
        };

        resolve_discoveries(&client, &token).await;

        // Poll faster while channels are actively posting.
        let delay = if new_messages > 0 {
            SLEEP_WITH_UPDATES
        } else {
            SLEEP_WITHOUT_UPDATES
        };

        tokio::select! {
            _ = token.cancelled() => {
                log::info!("Reader canceled, shutting down cleanly");
                return;
            }
            _ = sleep(delay) => (),
        }
    }
}

async fn run_cycle(client: &Client, token: &CancellationToken) -> Result<usize, ReaderError> {
    let channels = {
        let mut connection = db::pool().get().map_err(pool_error)?;
        crate::db::channels::all_active(&mut connection)?
    };

    let workers = channel_worker_count();
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut handles = vec![];

    for channel in channels {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        if token.is_cancelled() {
            break;
        }

        let client = client.clone();
        let channel_token = token.clone();

        handles.push(tokio::spawn(async move {
            let result = channel_fetcher::fetch_channel(&client, &channel, &channel_token).await;
            drop(permit);

            match result {
                Ok(count) => count,
                Err(error) => {
                    log::error!(
                        "Failed to fetch channel {}: {}",
                        channel.display_name(),
                        error.msg
                    );
                    record_channel_error(&channel, &error.msg);
                    0
                }
            }
        }));
    }

    let mut new_messages = 0;

    for handle in handles {
        match handle.await {
            Ok(count) => new_messages += count,
            Err(error) => log::error!("Channel worker panicked: {:?}", error),
        }
    }

    log::info!("Reader cycle finished, {} new messages", new_messages);

    Ok(new_messages)
}

fn record_channel_error(channel: &Channel, msg: &str) {
    let mut connection = match db::pool().get() {
        Ok(connection) => connection,
        Err(error) => {
            log::error!("Failed to fetch a connection from the pool {:?}", error);
            return;
        }
    };

    if let Err(error) = crate::db::channels::set_error(&mut connection, channel, msg) {
        log::error!("Failed to record a channel error {:?}", error);
    }
}

// Unknown peers and invite links surfaced by discovery extraction are
// resolved in the background, outside the per-channel fetch path.
async fn resolve_discoveries(client: &Client, token: &CancellationToken) {
    if token.is_cancelled() {
        return;
    }

    let (peers, invites) = {
        let mut connection = match db::pool().get() {
            Ok(connection) => connection,
            Err(error) => {
                log::error!("Failed to fetch a connection from the pool {:?}", error);
                return;
            }
        };

        let peers = crate::db::discoveries::pending_unresolved_peers(
            &mut connection,
            DISCOVERY_RESOLVE_BATCH,
        )
        .unwrap_or_default();
        let invites =
            crate::db::discoveries::pending_invites(&mut connection, DISCOVERY_RESOLVE_BATCH)
                .unwrap_or_default();

        (peers, invites)
    };

    for peer in peers {
        if token.is_cancelled() {
            return;
        }

        if let Err(error) = discovery::resolve_peer_discovery(client, &peer).await {
            log::error!(
                "Failed to resolve discovery {}: {}",
                peer.display_name(),
                error.msg
            );
        }
    }

    for invite in invites {
        if token.is_cancelled() {
            return;
        }

        if let Err(error) = discovery::resolve_invite_discovery(client, &invite).await {
            log::error!(
                "Failed to resolve discovery {}: {}",
                invite.display_name(),
                error.msg
            );
        }
    }
}

pub fn channel_worker_count() -> usize {
    let rps = Config::rate_limit_rps().max(1.0) as usize;

    rps.clamp(1, MAX_CHANNEL_WORKERS)
}

fn pool_error(error: diesel::r2d2::PoolError) -> ReaderError {
    ReaderError {
        msg: format!("{:?}", error),
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    #[test]
    fn channel_worker_count_is_bounded() {
        env::set_var("RATE_LIMIT_RPS", "0.2");
        assert_eq!(super::channel_worker_count(), 1);

        env::set_var("RATE_LIMIT_RPS", "4");
        assert_eq!(super::channel_worker_count(), 4);

        env::set_var("RATE_LIMIT_RPS", "100");
        assert_eq!(super::channel_worker_count(), 10);

        env::remove_var("RATE_LIMIT_RPS");
    }
}
