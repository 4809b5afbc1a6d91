pub mod bootstrap;
pub mod config;
pub mod embedding;
pub mod llm;
pub mod queue;
pub mod telemetry;
pub mod vector_store;

pub use bootstrap::build_pipeline;
pub use config::{AppConfig, Config, ConfigError, PromptsConfig};
pub use embedding::TextEmbedding;
pub use llm::RigLlm;
pub use queue::{keys, queues, JobResult, ProcessChatJob, QueueJobStatus};
pub use telemetry::init_tracing;
pub use vector_store::{InMemoryVectorIndex, QdrantVectorIndex};
