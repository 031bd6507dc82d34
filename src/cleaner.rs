pub mod clean_job;
pub mod remove_old_messages_job;

pub use clean_job::CleanJob;
pub use remove_old_messages_job::RemoveOldMessagesJob;

pub const JOB_TYPE: &str = "clean";
