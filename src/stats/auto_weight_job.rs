use crate::db;
use crate::models::channel::{MAX_WEIGHT, MIN_WEIGHT};
use fang::typetag;
use fang::FangError;
use fang::Queueable;
use fang::Runnable;
use fang::Scheduled;
use serde::{Deserialize, Serialize};

// Periodically folds rating reliability back into per-channel weights.
// Channels pinned to manual mode are left alone by the update query.
#[derive(Serialize, Deserialize, Default)]
pub struct AutoWeightJob {}

impl AutoWeightJob {
    pub fn new() -> Self {
        Self {}
    }

    pub fn execute(&self) -> Result<(), FangError> {
        let mut connection = db::pool().get()?;

        let channels = db::channels::all_active(&mut connection).map_err(|error| FangError {
            description: format!("{:?}", error),
        })?;

        for channel in channels {
            if !channel.auto_weight() {
                continue;
            }

            let stats = match crate::stats::channel_stats(&mut connection, channel.id) {
                Ok(stats) => stats,
                Err(error) => {
                    log::error!(
                        "Failed to compute stats for channel {}: {:?}",
                        channel.display_name(),
                        error
                    );
                    continue;
                }
            };

            let weight = weight_from_reliability(stats.reliability);

            if let Err(error) = db::channels::set_auto_weight(&mut connection, channel.id, weight) {
                log::error!(
                    "Failed to update the weight of channel {}: {:?}",
                    channel.display_name(),
                    error
                );
            }
        }

        Ok(())
    }
}

pub fn weight_from_reliability(reliability: f64) -> f64 {
    MIN_WEIGHT + reliability.clamp(0.0, 1.0) * (MAX_WEIGHT - MIN_WEIGHT)
}

#[typetag::serde]
impl Runnable for AutoWeightJob {
    fn run(&self, _queue: &dyn Queueable) -> Result<(), FangError> {
        self.execute()
    }

    fn task_type(&self) -> String {
        super::JOB_TYPE.to_string()
    }

    fn uniq(&self) -> bool {
        true
    }

    fn cron(&self) -> Option<Scheduled> {
        // Hourly, on the hour.
        Some(Scheduled::CronPattern("0 0 * * * * *".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::weight_from_reliability;

    #[test]
    fn reliability_maps_into_the_weight_range() {
        assert_eq!(weight_from_reliability(0.0), 0.1);
        assert_eq!(weight_from_reliability(1.0), 2.0);

        let neutral = weight_from_reliability(0.5);
        assert!(neutral > 1.0 && neutral < 1.1);
    }
}
