use super::Command;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

static COMMAND: &str = "/start";

#[derive(TypedBuilder)]
pub struct Start {}

impl Command for Start {
    fn response(&self, _db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        "This bot curates tracked Telegram channels into periodic digests.\n\
         Send /help for the command list."
            .to_string()
    }
}

impl Start {
    pub fn command() -> &'static str {
        COMMAND
    }
}
