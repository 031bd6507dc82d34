use crate::config::Config;
use crate::db;
use fang::Queue;
use fang::Queueable;
use fang::RetentionMode;
use fang::WorkerPool;

pub mod filter;
pub mod process_cycle_job;
pub mod process_message_job;

pub use process_cycle_job::ProcessCycleJob;
pub use process_message_job::ProcessMessageJob;

pub const JOB_TYPE: &str = "pipeline";

// The worker role: schedules the recurring jobs and runs the fang worker
// pools until the process is terminated.
pub fn start() {
    let queue = Queue::builder().connection_pool(db::pool().clone()).build();

    queue
        .schedule_task(&ProcessCycleJob::new())
        .expect("Failed to schedule the processing cycle");
    queue
        .schedule_task(&crate::stats::AutoWeightJob::new())
        .expect("Failed to schedule the auto weight job");
    queue
        .schedule_task(&crate::cleaner::CleanJob::new())
        .expect("Failed to schedule the clean job");

    log::info!("Starting pipeline workers");

    start_worker_pool(queue.clone(), JOB_TYPE, Config::worker_number());
    start_worker_pool(queue.clone(), crate::stats::JOB_TYPE, 1);
    start_worker_pool(queue, crate::cleaner::JOB_TYPE, 2);

    std::thread::park();
}

fn start_worker_pool(queue: Queue, task_type: &str, number_of_workers: u32) {
    let mut worker_pool = WorkerPool::<Queue>::builder()
        .queue(queue)
        .retention_mode(RetentionMode::RemoveAll)
        .number_of_workers(number_of_workers)
        .task_type(task_type.to_string())
        .build();

    worker_pool
        .start()
        .unwrap_or_else(|_| panic!("Failed to start {} workers", task_type));
}
