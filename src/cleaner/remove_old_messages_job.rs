use crate::config::Config;
use crate::db;
use fang::typetag;
use fang::FangError;
use fang::Queueable;
use fang::Runnable;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct RemoveOldMessagesJob {
    pub channel_id: i64,
}

impl RemoveOldMessagesJob {
    pub fn new(channel_id: i64) -> Self {
        Self { channel_id }
    }

    pub fn execute(&self) -> Result<(), FangError> {
        let mut connection = db::pool().get()?;
        let retention_days = Config::retention_days();

        let removed_items = db::items::delete_terminal_older_than(
            &mut connection,
            self.channel_id,
            retention_days,
        )
        .map_err(|error| FangError {
            description: format!("{:?}", error),
        })?;

        let removed_messages = db::raw_messages::delete_older_than(
            &mut connection,
            self.channel_id,
            retention_days,
        )
        .map_err(|error| FangError {
            description: format!("{:?}", error),
        })?;

        if removed_items > 0 || removed_messages > 0 {
            log::info!(
                "Removed {} old items and {} old raw messages for channel {}",
                removed_items,
                removed_messages,
                self.channel_id
            );
        }

        Ok(())
    }
}

#[typetag::serde]
impl Runnable for RemoveOldMessagesJob {
    fn run(&self, _queue: &dyn Queueable) -> Result<(), FangError> {
        self.execute()
    }

    fn task_type(&self) -> String {
        super::JOB_TYPE.to_string()
    }

    fn uniq(&self) -> bool {
        true
    }
}
