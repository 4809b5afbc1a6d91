use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::QueryResponse;
use crate::domain::{ConversationTurn, Query};

pub mod queues {
    pub const CHAT_QUEUE: &str = "jobs:chat";
}

pub mod keys {
    use uuid::Uuid;

    pub fn job_status(job_id: &Uuid) -> String {
        format!("job:status:{}", job_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Status record stored under [`keys::job_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub status: QueueJobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResponse>,
    /// Safe to show to the end user; technical detail stays in the logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobResult {
    fn with_status(job_id: Uuid, status: QueueJobStatus) -> Self {
        Self {
            job_id,
            status,
            result: None,
            error: None,
            completed_at: None,
        }
    }

    pub fn pending(job_id: Uuid) -> Self {
        Self::with_status(job_id, QueueJobStatus::Pending)
    }

    pub fn processing(job_id: Uuid) -> Self {
        Self::with_status(job_id, QueueJobStatus::Processing)
    }

    pub fn completed(job_id: Uuid, response: QueryResponse) -> Self {
        Self {
            result: Some(response),
            completed_at: Some(Utc::now()),
            ..Self::with_status(job_id, QueueJobStatus::Completed)
        }
    }

    pub fn failed(job_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            completed_at: Some(Utc::now()),
            ..Self::with_status(job_id, QueueJobStatus::Failed)
        }
    }
}

/// A question answered off the request path by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessChatJob {
    pub job_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl ProcessChatJob {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            message: message.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn into_query(self) -> Query {
        Query::new(self.message).with_history(self.history)
    }
}
