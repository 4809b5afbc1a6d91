use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::application::services::{CitationFormatter, Retriever};
use crate::domain::{
    ports::{LlmService, TokenStream},
    Citation, DomainError, GenerationError, Prompt,
};

#[derive(Debug, Clone, Copy)]
pub struct GenerationLimits {
    /// Upper bound on the whole generation, first byte to last.
    pub total: Duration,
    /// Longest allowed silence between two deltas.
    pub idle: Duration,
}

/// Degradation policy around retrieval and generation.
///
/// Retrieval problems downgrade to an ungrounded answer. Generation
/// problems are terminal and are never retried here; a retry is a new
/// pipeline invocation by the caller.
pub struct FallbackController {
    retriever: Arc<Retriever>,
    formatter: CitationFormatter,
    limits: GenerationLimits,
}

impl FallbackController {
    pub fn new(
        retriever: Arc<Retriever>,
        formatter: CitationFormatter,
        limits: GenerationLimits,
    ) -> Self {
        Self {
            retriever,
            formatter,
            limits,
        }
    }

    pub fn limits(&self) -> GenerationLimits {
        self.limits
    }

    /// Citations for `query`, or an empty list when retrieval failed or
    /// found nothing.
    #[instrument(skip(self))]
    pub async fn ground(&self, query: &str) -> Vec<Citation> {
        match self.retriever.retrieve(query).await {
            Ok(results) if results.is_empty() => {
                info!("no matching chunks; answering ungrounded");
                Vec::new()
            }
            Ok(results) => self.formatter.format(&results),
            Err(e) => {
                warn!(error = %e, "retrieval failed; answering ungrounded");
                Vec::new()
            }
        }
    }

    /// Citations for the top `k` chunks. Errors propagate; this backs
    /// direct search, not answer generation.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Citation>, DomainError> {
        let results = self.retriever.retrieve_top_k(query, k).await?;
        Ok(self.formatter.format(&results))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Opens the model stream within the total deadline.
    pub async fn open_stream(
        &self,
        llm: &dyn LlmService,
        prompt: &Prompt,
        deadline: Instant,
    ) -> Result<TokenStream, GenerationError> {
        tokio::time::timeout_at(deadline, llm.stream(prompt))
            .await
            .map_err(|_| GenerationError::Timeout)?
    }

    /// Next text delta, `None` at end of output.
    pub async fn next_delta(
        &self,
        tokens: &mut TokenStream,
        deadline: Instant,
    ) -> Result<Option<String>, GenerationError> {
        let idle_deadline = Instant::now() + self.limits.idle;
        tokio::time::timeout_at(deadline.min(idle_deadline), tokens.next())
            .await
            .map_err(|_| GenerationError::Timeout)?
            .transpose()
    }

    /// Logs the technical detail and returns the message safe to show.
    pub fn generation_failure(&self, err: &GenerationError) -> &'static str {
        error!(error = %err, "generation failed");
        err.user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ports::{EmbeddingService, VectorIndex},
        ChunkBody, DocumentChunk, Embedding, SearchResult,
    };
    use async_trait::async_trait;
    use futures::stream;

    struct Encoder;

    #[async_trait]
    impl EmbeddingService for Encoder {
        async fn embed(&self, _text: &str) -> Result<Embedding, DomainError> {
            Ok(Embedding::new(vec![1.0]))
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_id(&self) -> &str {
            "test"
        }
    }

    enum IndexBehaviour {
        Broken,
        Empty,
        One,
    }

    #[async_trait]
    impl VectorIndex for IndexBehaviour {
        fn backend(&self) -> &'static str {
            "test"
        }

        fn embedding_model(&self) -> Option<&str> {
            Some("test")
        }

        async fn search(
            &self,
            _query: &Embedding,
            _top_k: usize,
        ) -> Result<Vec<SearchResult>, DomainError> {
            match self {
                Self::Broken => Err(DomainError::retrieval("index file corrupt")),
                Self::Empty => Ok(Vec::new()),
                Self::One => Ok(vec![SearchResult {
                    chunk: DocumentChunk::new(0, ChunkBody::plain("text")),
                    score: 0.4,
                }]),
            }
        }

        async fn len(&self) -> Result<usize, DomainError> {
            Ok(0)
        }
    }

    fn controller(index: IndexBehaviour, idle_ms: u64) -> FallbackController {
        FallbackController::new(
            Arc::new(Retriever::new(Arc::new(Encoder), Arc::new(index), 5)),
            CitationFormatter::new("DSM-5-TR", 200),
            GenerationLimits {
                total: Duration::from_secs(5),
                idle: Duration::from_millis(idle_ms),
            },
        )
    }

    #[tokio::test]
    async fn test_broken_index_degrades_to_empty() {
        assert!(controller(IndexBehaviour::Broken, 100).ground("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_no_results_degrades_to_empty() {
        assert!(controller(IndexBehaviour::Empty, 100).ground("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_results_become_citations() {
        let citations = controller(IndexBehaviour::One, 100).ground("q").await;
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].id, 1);
    }

    #[tokio::test]
    async fn test_search_propagates_index_failure() {
        let err = controller(IndexBehaviour::Broken, 100)
            .search("q", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_idle_stream_times_out() {
        let fallback = controller(IndexBehaviour::Empty, 20);
        let mut tokens: TokenStream = stream::iter(vec![Ok("first".to_string())])
            .chain(stream::pending())
            .boxed();
        let deadline = Instant::now() + Duration::from_secs(5);

        assert_eq!(
            fallback.next_delta(&mut tokens, deadline).await,
            Ok(Some("first".to_string()))
        );
        assert_eq!(
            fallback.next_delta(&mut tokens, deadline).await,
            Err(GenerationError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_end_of_stream_is_none() {
        let fallback = controller(IndexBehaviour::Empty, 20);
        let mut tokens: TokenStream = stream::empty().boxed();
        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(fallback.next_delta(&mut tokens, deadline).await, Ok(None));
    }
}
