use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use uuid::Uuid;

use crate::infrastructure::{keys, queues, JobResult, ProcessChatJob};

pub type RedisPool = Pool;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis pool error: {0}")]
    Pool(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

pub fn create_pool(redis_url: &str) -> Result<RedisPool> {
    let cfg = Config::from_url(redis_url);
    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| QueueError::Pool(e.to_string()))
}

async fn conn(pool: &RedisPool) -> Result<deadpool_redis::Connection> {
    pool.get().await.map_err(|e| QueueError::Pool(e.to_string()))
}

/// Writes a job's status record with the configured expiry.
pub async fn store_status(pool: &RedisPool, status: &JobResult, ttl_seconds: u64) -> Result<()> {
    let mut conn = conn(pool).await?;
    let json = serde_json::to_string(status)?;
    conn.set_ex::<_, _, ()>(keys::job_status(&status.job_id), json, ttl_seconds)
        .await
        .map_err(|e| QueueError::Redis(e.to_string()))
}

#[derive(Clone)]
pub struct JobProducer {
    pool: RedisPool,
    result_ttl_seconds: u64,
}

impl JobProducer {
    pub fn new(pool: RedisPool, result_ttl_seconds: u64) -> Self {
        Self {
            pool,
            result_ttl_seconds,
        }
    }

    pub async fn push_chat_job(&self, job: &ProcessChatJob) -> Result<Uuid> {
        let payload = serde_json::to_string(job)?;
        store_status(&self.pool, &JobResult::pending(job.job_id), self.result_ttl_seconds).await?;

        let mut conn = conn(&self.pool).await?;
        conn.lpush::<_, _, ()>(queues::CHAT_QUEUE, payload)
            .await
            .map_err(|e| QueueError::Redis(e.to_string()))?;

        tracing::info!(job_id = %job.job_id, queue = queues::CHAT_QUEUE, "job queued");
        Ok(job.job_id)
    }

    pub async fn get_job_status(&self, job_id: &Uuid) -> Result<Option<JobResult>> {
        let mut conn = conn(&self.pool).await?;
        let result: Option<String> = conn
            .get(keys::job_status(job_id))
            .await
            .map_err(|e| QueueError::Redis(e.to_string()))?;

        result
            .map(|json| serde_json::from_str(&json).map_err(Into::into))
            .transpose()
    }
}
