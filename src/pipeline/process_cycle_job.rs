use super::ProcessMessageJob;
use crate::config::Config;
use crate::db;
use fang::typetag;
use fang::FangError;
use fang::Queueable;
use fang::Runnable;
use fang::Scheduled;
use serde::{Deserialize, Serialize};

// Runs every minute and fans unprocessed raw messages out as one job per
// message, so a poisoned message never takes the batch down with it.
#[derive(Serialize, Deserialize, Default)]
pub struct ProcessCycleJob {}

impl ProcessCycleJob {
    pub fn new() -> Self {
        Self {}
    }
}

#[typetag::serde]
impl Runnable for ProcessCycleJob {
    fn run(&self, queue: &dyn Queueable) -> Result<(), FangError> {
        let mut connection = db::pool().get()?;

        let messages =
            db::raw_messages::find_unprocessed(&mut connection, Config::pipeline_batch_size())
                .map_err(|error| FangError {
                    description: format!("{:?}", error),
                })?;

        let count = messages.len();

        for message in messages {
            queue.insert_task(&ProcessMessageJob::new(message.id))?;
        }

        if count > 0 {
            log::info!("Enqueued {} raw messages for processing", count);
        }

        Ok(())
    }

    fn task_type(&self) -> String {
        super::JOB_TYPE.to_string()
    }

    fn uniq(&self) -> bool {
        true
    }

    fn cron(&self) -> Option<Scheduled> {
        // Seconds, minutes, hours, day of month, month, day of week, year.
        Some(Scheduled::CronPattern("0 * * * * * *".to_string()))
    }
}
