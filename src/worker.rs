use deadpool_redis::{redis::AsyncCommands, Connection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::info;

use grounded_rag::api::queue::{create_pool, store_status, QueueError, RedisPool};
use grounded_rag::application::RagPipeline;
use grounded_rag::infrastructure::{
    build_pipeline, init_tracing, queues, AppConfig, JobResult, ProcessChatJob,
};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Redis pool error: {0}")]
    Pool(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

pub struct WorkerState {
    pub redis_pool: RedisPool,
    pub pipeline: Arc<RagPipeline>,
    pub result_ttl_seconds: u64,
}

pub struct JobConsumer {
    state: Arc<WorkerState>,
    concurrency: usize,
}

impl JobConsumer {
    pub fn new(state: WorkerState, concurrency: usize) -> Self {
        Self {
            state: Arc::new(state),
            concurrency: concurrency.max(1),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!(concurrency = self.concurrency, "consumer started");

        // Never closed; runs until the process stops.
        while let Ok(permit) = semaphore.clone().acquire_owned().await {
            let state = self.state.clone();

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = process_next_job(&state).await {
                    tracing::error!(error = %e, "job failed");
                }
            });

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }
}

async fn conn(state: &WorkerState) -> Result<Connection> {
    state
        .redis_pool
        .get()
        .await
        .map_err(|e| WorkerError::Pool(e.to_string()))
}

async fn process_next_job(state: &WorkerState) -> Result<()> {
    let mut c = conn(state).await?;

    let result: Option<(String, String)> = c
        .brpop(queues::CHAT_QUEUE, 1.0)
        .await
        .map_err(|e| WorkerError::Redis(e.to_string()))?;
    drop(c);

    if let Some((_, job_json)) = result {
        process_chat_job(state, serde_json::from_str(&job_json)?).await?;
    }
    Ok(())
}

async fn process_chat_job(state: &WorkerState, job: ProcessChatJob) -> Result<()> {
    let job_id = job.job_id;
    tracing::info!(%job_id, "processing chat");
    let ttl = state.result_ttl_seconds;

    store_status(&state.redis_pool, &JobResult::processing(job_id), ttl).await?;

    let status = match state.pipeline.answer(job.into_query()).await {
        Ok(response) => JobResult::completed(job_id, response),
        Err(e) => {
            tracing::warn!(%job_id, error = %e, "chat job did not produce an answer");
            JobResult::failed(job_id, e.user_message())
        }
    };
    store_status(&state.redis_pool, &status, ttl).await?;

    tracing::info!(%job_id, status = ?status.status, "chat finished");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("worker=debug,grounded_rag=debug");

    let config = AppConfig::from_env()?;

    let redis_pool = create_pool(&config.config.redis_url)?;
    info!("Redis connected");

    let pipeline = build_pipeline(&config).await?;

    let state = WorkerState {
        redis_pool,
        pipeline,
        result_ttl_seconds: config.config.worker.result_ttl_seconds,
    };
    let concurrency = config.config.worker.concurrency;
    let consumer = JobConsumer::new(state, concurrency);

    info!(concurrency, "worker started");
    consumer.start().await?;

    Ok(())
}
