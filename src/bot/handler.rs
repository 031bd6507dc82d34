use super::commands::BotCommand;
use super::commands::Command;
use super::commands::{
    AddChannel, Annotate, ChannelSettings, DigestNow, Discoveries, Filters, Help, ListChannels,
    LlmCommand, RateItem, RemoveChannel, Retry, ScheduleCommand, Start, System, Thresholds,
    UnknownCommand,
};
use crate::bot::telegram_client;
use crate::bot::telegram_client::Api;
use crate::config::Config;
use crate::db;
use crate::db::settings;
use diesel::r2d2;
use diesel::PgConnection;
use frankenstein::CallbackQuery;
use frankenstein::Message;
use frankenstein::Update;
use frankenstein::UpdateContent;
use std::str::FromStr;
use std::thread;

pub struct Handler {}

impl Handler {
    pub fn start() {
        let mut api = telegram_client::api().clone();
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(Config::commands_db_pool_number() as usize)
            .build()
            .unwrap();

        log::info!("Starting the curador bot");

        let interval = std::time::Duration::from_secs(1);

        loop {
            while let Some(update) = api.next_update() {
                let db_pool = db::pool().clone();
                let tg_api = api.clone();

                thread_pool.spawn(move || Self::process_update(db_pool, tg_api, update));
            }

            thread::sleep(interval);
        }
    }

    fn process_update(
        db_pool: r2d2::Pool<r2d2::ConnectionManager<PgConnection>>,
        api: Api,
        update: Update,
    ) {
        match update.content {
            UpdateContent::Message(message) => Self::process_message(db_pool, api, message),
            UpdateContent::CallbackQuery(callback_query) => {
                Self::process_callback(db_pool, api, callback_query)
            }
            _ => (),
        }
    }

    fn process_message(
        db_pool: r2d2::Pool<r2d2::ConnectionManager<PgConnection>>,
        api: Api,
        message: Message,
    ) {
        let user_id = match message.from.as_ref() {
            Some(user) => user.id as i64,
            None => return,
        };

        if !Self::is_admin(&db_pool, user_id) {
            log::info!("Ignoring a command from non-admin {}", user_id);
            return;
        }

        let text = match message.text.clone() {
            Some(text) => text,
            None => return,
        };

        let command = BotCommand::from_str(&text).unwrap();

        match command {
            BotCommand::Start => Start::builder().build().execute(db_pool, api, message),

            BotCommand::Help => Help::builder().build().execute(db_pool, api, message),

            BotCommand::AddChannel(args) => AddChannel::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::RemoveChannel(args) => RemoveChannel::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::ListChannels => ListChannels::builder()
                .build()
                .execute(db_pool, api, message),

            BotCommand::ChannelSettings(args) => ChannelSettings::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::Discoveries(args) => Discoveries::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::DigestNow(args) => DigestNow::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::Retry(args) => Retry::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::Schedule(args) => ScheduleCommand::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::Filters(args) => Filters::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::Thresholds(args) => Thresholds::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::Llm(args) => LlmCommand::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::System(args) => System::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::Annotate(args) => Annotate::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::RateItem(args) => RateItem::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),

            BotCommand::UnknownCommand(args) => UnknownCommand::builder()
                .args(args)
                .build()
                .execute(db_pool, api, message),
        };
    }

    // Digest vote buttons arrive as callback queries shaped
    // digest_vote:<digest_id>:<up|down>.
    fn process_callback(
        db_pool: r2d2::Pool<r2d2::ConnectionManager<PgConnection>>,
        api: Api,
        callback_query: CallbackQuery,
    ) {
        let data = match callback_query.data.as_ref() {
            Some(data) => data.clone(),
            None => return,
        };

        let mut parts = data.split(':');

        if parts.next() != Some("digest_vote") {
            return;
        }

        let digest_id = match parts.next().and_then(|id| id.parse::<i64>().ok()) {
            Some(digest_id) => digest_id,
            None => return,
        };

        let value = match parts.next() {
            Some("up") => 1,
            Some("down") => -1,
            _ => return,
        };

        let user_id = callback_query.from.id as i64;

        let mut connection = match db_pool.get() {
            Ok(connection) => connection,
            Err(error) => {
                log::error!("Failed to fetch a connection from the pool {:?}", error);
                return;
            }
        };

        let answer = match db::ratings::save_digest_vote(&mut connection, digest_id, user_id, value)
        {
            Ok(_) => "Vote counted",
            Err(error) => {
                log::error!("Failed to save a digest vote: {:?}", error);
                "Failed to save the vote"
            }
        };

        if let Err(error) = api.answer_callback(&callback_query.id, answer) {
            log::error!("Failed to answer a callback query {:?}", error);
        }
    }

    fn is_admin(db_pool: &r2d2::Pool<r2d2::ConnectionManager<PgConnection>>, user_id: i64) -> bool {
        let mut connection = match db_pool.get() {
            Ok(connection) => connection,
            Err(error) => {
                log::error!("Failed to fetch a connection from the pool {:?}", error);
                return false;
            }
        };

        settings::admin_ids(&mut connection).contains(&user_id)
    }
}
