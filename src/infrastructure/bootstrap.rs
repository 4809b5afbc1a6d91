use rig::client::ProviderClient;
use rig::providers::{anthropic, gemini, groq, openai};
use std::sync::Arc;
use tracing::info;

use crate::application::{
    CitationFormatter, ContextAssembler, FallbackController, RagPipeline, Retriever,
};
use crate::domain::{
    ports::{EmbeddingService, LlmService, VectorIndex},
    DomainError,
};
use crate::infrastructure::config::{AppConfig, IndexConfig, LlmConfig, LlmProvider};
use crate::infrastructure::{
    embedding::TextEmbedding,
    llm::RigLlm,
    vector_store::{InMemoryVectorIndex, QdrantVectorIndex},
};

pub async fn build_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>, DomainError> {
    let index: Arc<dyn VectorIndex> = match config {
        IndexConfig::InMemory { corpus_path } => {
            Arc::new(InMemoryVectorIndex::load(corpus_path).await?)
        }
        IndexConfig::Qdrant {
            url,
            collection,
            embedding_model,
        } => Arc::new(QdrantVectorIndex::connect(url, collection, embedding_model.clone()).await?),
    };
    Ok(index)
}

/// Provider API keys are read from the environment (`OPENAI_API_KEY`,
/// `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`, `GROQ_API_KEY`).
pub fn build_llm(config: &LlmConfig) -> Arc<dyn LlmService> {
    match config.provider {
        LlmProvider::OpenAi => Arc::new(RigLlm::new(openai::Client::from_env(), config)),
        LlmProvider::Anthropic => Arc::new(RigLlm::new(anthropic::Client::from_env(), config)),
        LlmProvider::Gemini => Arc::new(RigLlm::new(gemini::Client::from_env(), config)),
        LlmProvider::Groq => Arc::new(RigLlm::new(groq::Client::from_env(), config)),
    }
}

/// Builds the encoder, index and model client once; the returned pipeline
/// is shared by every request for the life of the process.
pub async fn build_pipeline(app: &AppConfig) -> Result<Arc<RagPipeline>, DomainError> {
    let config = &app.config;

    let embedding: Arc<dyn EmbeddingService> =
        Arc::new(TextEmbedding::from_config(&config.embedding));
    let index = build_index(&config.index).await?;
    Retriever::verify_encoder(index.as_ref(), embedding.as_ref())?;

    let llm = build_llm(&config.llm);
    info!(
        backend = index.backend(),
        encoder = embedding.model_id(),
        llm = llm.model(),
        "pipeline ready"
    );

    let retriever = Arc::new(Retriever::new(embedding, index, config.rag.top_k));
    let fallback = FallbackController::new(
        retriever,
        CitationFormatter::new(config.rag.corpus_name.clone(), config.rag.preview_chars),
        app.generation_limits(),
    );
    let assembler = ContextAssembler::new(app.prompt_templates(), config.rag.history_window);

    Ok(Arc::new(RagPipeline::new(
        fallback,
        assembler,
        llm,
        app.pipeline_settings(),
    )))
}
