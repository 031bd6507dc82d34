use super::RemoveOldMessagesJob;
use crate::db;
use fang::typetag;
use fang::FangError;
use fang::Queueable;
use fang::Runnable;
use fang::Scheduled;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Default)]
pub struct CleanJob {}

impl CleanJob {
    pub fn new() -> Self {
        Self {}
    }

    pub fn execute(&self, queue: &dyn Queueable) -> Result<(), FangError> {
        let mut connection = db::pool().get()?;

        let channels = db::channels::all(&mut connection).map_err(|error| FangError {
            description: format!("{:?}", error),
        })?;

        let total_number = channels.len();

        for channel in channels {
            queue.insert_task(&RemoveOldMessagesJob::new(channel.id))?;
        }

        log::info!(
            "Finished enqueuing channels for removal of old messages. Total number: {}",
            total_number
        );

        Ok(())
    }
}

#[typetag::serde]
impl Runnable for CleanJob {
    fn run(&self, queue: &dyn Queueable) -> Result<(), FangError> {
        self.execute(queue)
    }

    fn task_type(&self) -> String {
        super::JOB_TYPE.to_string()
    }

    fn uniq(&self) -> bool {
        true
    }

    fn cron(&self) -> Option<Scheduled> {
        // Once a day, at night.
        Some(Scheduled::CronPattern("0 0 3 * * * *".to_string()))
    }
}
