use crate::config::Config;
use chrono::prelude::*;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::r2d2;
use std::sync::OnceLock;

#[cfg(test)]
use diesel::connection::Connection;

#[cfg(test)]
use dotenv::dotenv;

pub mod annotations;
pub mod channels;
pub mod clusters;
pub mod digests;
pub mod discoveries;
pub mod items;
pub mod llm_usage;
pub mod ratings;
pub mod raw_messages;
pub mod settings;

static POOL: OnceLock<r2d2::Pool<r2d2::ConnectionManager<PgConnection>>> = OnceLock::new();

#[cfg(test)]
pub fn establish_test_connection() -> PgConnection {
    dotenv().ok();

    let url = database_url();

    PgConnection::establish(&url).unwrap_or_else(|_| panic!("Error connecting to {}", url))
}

pub fn current_time() -> DateTime<Utc> {
    Utc::now().round_subsecs(0)
}

pub fn pool() -> &'static r2d2::Pool<r2d2::ConnectionManager<PgConnection>> {
    POOL.get_or_init(create_connection_pool)
}

pub fn create_connection_pool() -> r2d2::Pool<r2d2::ConnectionManager<PgConnection>> {
    let url = database_url();

    let manager = r2d2::ConnectionManager::<PgConnection>::new(url);

    r2d2::Pool::builder()
        .max_size(Config::database_pool_size())
        .min_idle(Some(Config::database_min_idle()))
        .idle_timeout(Some(std::time::Duration::from_secs(
            Config::database_idle_timeout_seconds(),
        )))
        .max_lifetime(Some(std::time::Duration::from_secs(
            Config::database_max_lifetime_seconds(),
        )))
        .build(manager)
        .unwrap()
}

pub fn database_url() -> String {
    Config::database_url()
}
