#[macro_use]
extern crate diesel;

pub mod bot;
pub mod cleaner;
pub mod config;
pub mod db;
pub mod digest;
pub mod health;
pub mod http_client;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod shutdown;
pub mod stats;
