use crate::bot::telegram_client::Api;
use crate::bot::telegram_client::SimpleMessageParams;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::r2d2::PooledConnection;
use diesel::PgConnection;
use frankenstein::Message;
use std::str::FromStr;

pub mod add_channel;
pub mod annotate;
pub mod channel_settings;
pub mod digest_now;
pub mod discoveries;
pub mod filters;
pub mod help;
pub mod list_channels;
pub mod llm_command;
pub mod rate_item;
pub mod remove_channel;
pub mod retry;
pub mod schedule_command;
pub mod start;
pub mod system;
pub mod thresholds;
pub mod unknown_command;

pub use add_channel::AddChannel;
pub use annotate::Annotate;
pub use channel_settings::ChannelSettings;
pub use digest_now::DigestNow;
pub use discoveries::Discoveries;
pub use filters::Filters;
pub use help::Help;
pub use list_channels::ListChannels;
pub use llm_command::LlmCommand;
pub use rate_item::RateItem;
pub use remove_channel::RemoveChannel;
pub use retry::Retry;
pub use schedule_command::ScheduleCommand;
pub use start::Start;
pub use system::System;
pub use thresholds::Thresholds;
pub use unknown_command::UnknownCommand;

pub enum BotCommand {
    Start,
    Help,
    AddChannel(String),
    RemoveChannel(String),
    ListChannels,
    ChannelSettings(String),
    Discoveries(String),
    DigestNow(String),
    Retry(String),
    Schedule(String),
    Filters(String),
    Thresholds(String),
    Llm(String),
    System(String),
    Annotate(String),
    RateItem(String),
    UnknownCommand(String),
}

impl FromStr for BotCommand {
    type Err = ();

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let (token, args) = match trimmed.split_once(char::is_whitespace) {
            Some((token, args)) => (token, args.trim().to_string()),
            None => (trimmed, String::new()),
        };

        // Commands in groups arrive as /command@botname.
        let token = token.split('@').next().unwrap_or(token);

        let result = match token {
            "/start" => BotCommand::Start,
            "/help" => BotCommand::Help,
            "/add" => BotCommand::AddChannel(args),
            "/remove" => BotCommand::RemoveChannel(args),
            "/list" => BotCommand::ListChannels,
            "/channel" => BotCommand::ChannelSettings(args),
            "/discoveries" => BotCommand::Discoveries(args),
            "/digest" => BotCommand::DigestNow(args),
            "/retry" => BotCommand::Retry(args),
            "/schedule" => BotCommand::Schedule(args),
            "/filters" => BotCommand::Filters(args),
            "/thresholds" => BotCommand::Thresholds(args),
            "/llm" => BotCommand::Llm(args),
            "/system" => BotCommand::System(args),
            "/annotate" => BotCommand::Annotate(args),
            "/rate" => BotCommand::RateItem(args),
            _ => BotCommand::UnknownCommand(trimmed.to_string()),
        };

        Ok(result)
    }
}

pub trait Command {
    fn response(
        &self,
        db_pool: Pool<ConnectionManager<PgConnection>>,
        message: &Message,
    ) -> String;

    fn execute(&self, db_pool: Pool<ConnectionManager<PgConnection>>, api: Api, message: Message) {
        if let Some(text) = message.text.as_ref() {
            log::info!("{:?} wrote: {}", message.chat.id, text);
        }

        let text = self.response(db_pool, &message);

        self.reply_to_message(api, message, text);
    }

    fn reply_to_message(&self, api: Api, message: Message, text: String) {
        let message_params = SimpleMessageParams::builder()
            .chat_id(message.chat.id)
            .message(text)
            .reply_message_id(message.message_id)
            .build();

        if let Err(error) = api.reply_with_text_message(&message_params) {
            log::error!("Failed to reply to update {:?} {:?}", error, message);
        }
    }

    fn fetch_db_connection(
        &self,
        db_pool: Pool<ConnectionManager<PgConnection>>,
    ) -> Result<PooledConnection<ConnectionManager<PgConnection>>, String> {
        match db_pool.get() {
            Ok(connection) => Ok(connection),
            Err(err) => {
                log::error!("Failed to fetch a connection from the pool {:?}", err);

                Err("Failed to process the command, please try again".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BotCommand;
    use std::str::FromStr;

    #[test]
    fn parses_commands_with_arguments() {
        match BotCommand::from_str("/add @rustlang").unwrap() {
            BotCommand::AddChannel(args) => assert_eq!(args, "@rustlang"),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn parses_commands_with_bot_handles() {
        match BotCommand::from_str("/retry@curador_bot confirm").unwrap() {
            BotCommand::Retry(args) => assert_eq!(args, "confirm"),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn unknown_input_becomes_unknown_command() {
        match BotCommand::from_str("hello there").unwrap() {
            BotCommand::UnknownCommand(text) => assert_eq!(text, "hello there"),
            _ => panic!("wrong command"),
        }
    }
}
