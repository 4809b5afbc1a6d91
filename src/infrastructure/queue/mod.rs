mod jobs;

pub use jobs::{keys, queues, JobResult, ProcessChatJob, QueueJobStatus};
