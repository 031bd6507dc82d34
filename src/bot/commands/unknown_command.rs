use super::Command;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use frankenstein::Message;
use typed_builder::TypedBuilder;

#[derive(TypedBuilder)]
pub struct UnknownCommand {
    args: String,
}

impl Command for UnknownCommand {
    fn response(&self, _db_pool: Pool<ConnectionManager<PgConnection>>, _message: &Message) -> String {
        log::info!("Unknown command {}", self.args);

        "Unknown command. Send /help for the command list.".to_string()
    }
}
