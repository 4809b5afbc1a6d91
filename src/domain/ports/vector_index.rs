use crate::domain::{errors::DomainError, Embedding, SearchResult};
use async_trait::async_trait;

/// Read-only nearest-neighbour index over an externally built corpus.
/// One implementation is chosen at startup and shared by every query.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Embedding model the corpus was built with, if the index records it.
    fn embedding_model(&self) -> Option<&str>;

    /// Vector width of the stored embeddings, when known without a query.
    fn dimension(&self) -> Option<usize> {
        None
    }

    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError>;

    async fn len(&self) -> Result<usize, DomainError>;
}
