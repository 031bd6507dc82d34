use crate::db;
use crate::db::settings;
use chrono::{DateTime, Duration, Utc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub mod builder;
pub mod deliver;
pub mod render;
pub mod schedule;
pub mod split;

use schedule::Schedule;

// Re-reading the schedule at most once a minute keeps operator changes
// effective without restarting the role.
const REPLAN_INTERVAL_SECONDS: i64 = 60;

#[derive(Debug)]
pub struct DigestError {
    pub msg: String,
}

impl From<diesel::result::Error> for DigestError {
    fn from(error: diesel::result::Error) -> Self {
        let msg = format!("{:?}", error);

        DigestError { msg }
    }
}

impl From<diesel::r2d2::PoolError> for DigestError {
    fn from(error: diesel::r2d2::PoolError) -> Self {
        let msg = format!("{:?}", error);

        DigestError { msg }
    }
}

pub fn start(once: bool) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("digest-pool")
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        if once {
            match tokio::task::spawn_blocking(|| run_window(crate::db::current_time())).await {
                Ok(Ok(posted)) => log::info!("Digest run finished, posted: {}", posted),
                Ok(Err(error)) => log::error!("Digest run failed: {}", error.msg),
                Err(error) => log::error!("Digest run panicked: {:?}", error),
            }

            return;
        }

        let token = crate::shutdown::shutdown_token();

        scheduler_loop(token).await;
    });
}

async fn scheduler_loop(token: CancellationToken) {
    log::info!("Starting the digest scheduler");

    loop {
        if token.is_cancelled() {
            log::info!("Digest scheduler canceled, shutting down cleanly");
            return;
        }

        let now = db::current_time();

        let fire = match next_fire(now) {
            Ok(fire) => fire,
            Err(error) => {
                log::error!("Failed to plan the next digest: {}", error.msg);
                now + Duration::seconds(REPLAN_INTERVAL_SECONDS)
            }
        };

        let until_fire = (fire - now).num_seconds().max(0);
        let nap = until_fire.min(REPLAN_INTERVAL_SECONDS);

        tokio::select! {
            _ = token.cancelled() => {
                log::info!("Digest scheduler canceled, shutting down cleanly");
                return;
            }
            _ = sleep(std::time::Duration::from_secs(nap as u64)) => (),
        }

        // The schedule may have changed while asleep; only fire when the
        // freshly computed time has actually arrived.
        if db::current_time() >= fire {
            match tokio::task::spawn_blocking(move || run_window(fire)).await {
                Ok(Ok(posted)) => log::info!("Digest fired at {}, posted: {}", fire, posted),
                Ok(Err(error)) => log::error!("Digest build failed: {}", error.msg),
                Err(error) => log::error!("Digest build panicked: {:?}", error),
            }
        }
    }
}

// The next fire instant: the operator schedule when one is configured, the
// anchored window cadence otherwise.
pub fn next_fire(now: DateTime<Utc>) -> Result<DateTime<Utc>, DigestError> {
    let mut connection = db::pool().get()?;

    if let Some(value) = settings::get(&mut connection, settings::DIGEST_SCHEDULE) {
        match Schedule::parse(&value) {
            Ok(parsed) => {
                if let Some(fire) = parsed.next_times(now, 1).first() {
                    return Ok(*fire);
                }
            }
            Err(error) => {
                log::error!("Stored schedule is invalid: {}", error.msg);
            }
        }
    }

    let window_minutes = settings::digest_window_minutes(&mut connection);

    let anchor = settings::get(&mut connection, settings::DIGEST_ANCHOR)
        .and_then(|value| value.as_str().map(|anchor| anchor.to_string()))
        .and_then(|anchor| anchor.parse::<DateTime<Utc>>().ok())
        .unwrap_or(now);

    Ok(schedule::next_from_anchor(anchor, window_minutes, now))
}

// Builds and posts the digest for the window ending at `end`. Returns
// whether anything was posted.
pub fn run_window(end: DateTime<Utc>) -> Result<bool, DigestError> {
    let mut connection = db::pool().get()?;

    let window_minutes = settings::digest_window_minutes(&mut connection);
    let start = end - Duration::minutes(window_minutes.max(1));

    let plan = match builder::build(&mut connection, start, end)? {
        Some(plan) => plan,
        None => {
            log::info!("No ready items in [{}, {}], skipping digest", start, end);
            return Ok(false);
        }
    };

    deliver::post(&mut connection, plan)?;

    Ok(true)
}
