use std::sync::Arc;
use tracing::{instrument, warn};

use crate::domain::{
    ports::{EmbeddingService, VectorIndex},
    DomainError, SearchResult,
};

/// Embeds a query and asks the shared index for its nearest chunks.
pub struct Retriever {
    embedding: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    default_top_k: usize,
}

impl Retriever {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndex>,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedding,
            index,
            default_top_k,
        }
    }

    /// Startup check that the query encoder matches the corpus encoder,
    /// by model id and by vector width.
    /// An index that does not record its model only gets a warning.
    pub fn verify_encoder(
        index: &dyn VectorIndex,
        embedding: &dyn EmbeddingService,
    ) -> Result<(), DomainError> {
        if let Some(stored) = index.dimension() {
            if stored != embedding.dimension() {
                return Err(DomainError::EmbeddingDimensionMismatch {
                    index: stored,
                    encoder: embedding.dimension(),
                });
            }
        }

        match index.embedding_model() {
            Some(model) if model == embedding.model_id() => Ok(()),
            Some(model) => Err(DomainError::EmbeddingModelMismatch {
                index: model.to_string(),
                encoder: embedding.model_id().to_string(),
            }),
            None => {
                warn!(
                    backend = index.backend(),
                    encoder = embedding.model_id(),
                    "index does not record its embedding model; similarity scores are meaningless if it differs from the query encoder"
                );
                Ok(())
            }
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    #[instrument(skip(self))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>, DomainError> {
        self.retrieve_top_k(query, self.default_top_k).await
    }

    /// At most `top_k` results, by descending score, ties in corpus order.
    #[instrument(skip(self), fields(backend = self.index.backend()))]
    pub async fn retrieve_top_k(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("query must not be empty"));
        }
        if top_k == 0 {
            return Err(DomainError::validation("top_k must be at least 1"));
        }

        let embedding = self
            .embedding
            .embed(query)
            .await
            .map_err(|e| DomainError::retrieval(format!("query embedding failed: {e}")))?;

        let mut results = self.index.search(&embedding, top_k).await.map_err(|e| match e {
            DomainError::Retrieval(_) => e,
            other => DomainError::retrieval(other.to_string()),
        })?;

        results.retain(|r| r.score.is_finite());
        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.ordinal.cmp(&b.chunk.ordinal))
        });
        results.truncate(top_k);

        tracing::debug!(count = results.len(), "retrieved chunks");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkBody, DocumentChunk, Embedding};
    use async_trait::async_trait;

    struct FixedEmbedding(&'static str);

    #[async_trait]
    impl EmbeddingService for FixedEmbedding {
        async fn embed(&self, _text: &str) -> Result<Embedding, DomainError> {
            Ok(Embedding::new(vec![1.0, 0.0]))
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_id(&self) -> &str {
            self.0
        }
    }

    /// Returns canned results in a deliberately unsorted order.
    struct ScrambledIndex {
        scores: Vec<(usize, f32)>,
        model: Option<&'static str>,
        dimension: Option<usize>,
    }

    #[async_trait]
    impl VectorIndex for ScrambledIndex {
        fn backend(&self) -> &'static str {
            "scrambled"
        }

        fn embedding_model(&self) -> Option<&str> {
            self.model
        }

        fn dimension(&self) -> Option<usize> {
            self.dimension
        }

        async fn search(
            &self,
            _query: &Embedding,
            _top_k: usize,
        ) -> Result<Vec<SearchResult>, DomainError> {
            Ok(self
                .scores
                .iter()
                .map(|&(ordinal, score)| SearchResult {
                    chunk: DocumentChunk::new(ordinal, ChunkBody::plain(format!("chunk {ordinal}"))),
                    score,
                })
                .collect())
        }

        async fn len(&self) -> Result<usize, DomainError> {
            Ok(self.scores.len())
        }
    }

    fn retriever(scores: Vec<(usize, f32)>) -> Retriever {
        Retriever::new(
            Arc::new(FixedEmbedding("mini")),
            Arc::new(ScrambledIndex {
                scores,
                model: Some("mini"),
                dimension: Some(2),
            }),
            5,
        )
    }

    #[tokio::test]
    async fn test_sorted_with_ordinal_tie_break() {
        let r = retriever(vec![(4, 0.5), (2, 0.9), (3, 0.5), (1, 0.5)]);
        let results = r.retrieve_top_k("anxiety", 3).await.unwrap();

        let order: Vec<_> = results.iter().map(|r| r.chunk.ordinal).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_never_more_than_k_and_non_increasing() {
        let r = retriever((0..20).map(|i| (i, (i % 7) as f32 / 7.0)).collect());
        for k in 1..=8 {
            let results = r.retrieve_top_k("q", k).await.unwrap();
            assert!(results.len() <= k);
            assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[tokio::test]
    async fn test_drops_nan_scores() {
        let r = retriever(vec![(0, f32::NAN), (1, 0.2)]);
        let results = r.retrieve("q").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.ordinal, 1);
    }

    #[tokio::test]
    async fn test_rejects_empty_query_and_zero_k() {
        let r = retriever(vec![]);
        assert!(matches!(
            r.retrieve("   ").await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            r.retrieve_top_k("q", 0).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_verify_encoder_mismatch_fails() {
        let index = ScrambledIndex {
            scores: vec![],
            model: Some("all-MiniLM-L6-v2"),
            dimension: None,
        };
        let err = Retriever::verify_encoder(&index, &FixedEmbedding("text-embedding-3-small"))
            .unwrap_err();
        assert!(matches!(err, DomainError::EmbeddingModelMismatch { .. }));
    }

    #[test]
    fn test_verify_encoder_unknown_model_warns_only() {
        let index = ScrambledIndex {
            scores: vec![],
            model: None,
            dimension: None,
        };
        assert!(Retriever::verify_encoder(&index, &FixedEmbedding("any")).is_ok());
    }

    #[test]
    fn test_verify_encoder_dimension_mismatch_fails() {
        let index = ScrambledIndex {
            scores: vec![],
            model: Some("mini"),
            dimension: Some(384),
        };
        let err = Retriever::verify_encoder(&index, &FixedEmbedding("mini")).unwrap_err();
        assert!(matches!(
            err,
            DomainError::EmbeddingDimensionMismatch {
                index: 384,
                encoder: 2
            }
        ));
    }
}
