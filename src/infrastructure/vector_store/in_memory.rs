use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    ports::VectorIndex, ChunkBody, ChunkMetadata, DocumentChunk, DomainError, Embedding,
    SearchResult,
};

/// On-disk corpus produced by the offline ingestion job.
#[derive(Debug, Deserialize)]
struct CorpusFile {
    #[serde(default)]
    embedding_model: Option<String>,
    #[serde(default)]
    dimension: Option<usize>,
    chunks: Vec<ChunkRecord>,
}

#[derive(Debug, Deserialize)]
struct ChunkRecord {
    #[serde(default)]
    id: Option<Uuid>,
    content: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    criteria: Option<String>,
    #[serde(default)]
    complete_entry: Option<String>,
    embedding: Vec<f32>,
    #[serde(flatten)]
    metadata: ChunkMetadata,
}

/// Exhaustive cosine search over a corpus held in memory.
pub struct InMemoryVectorIndex {
    entries: Vec<(DocumentChunk, Embedding)>,
    embedding_model: Option<String>,
    dimension: usize,
}

impl InMemoryVectorIndex {
    /// All embeddings must share one dimension.
    pub fn new(
        embedding_model: Option<String>,
        entries: Vec<(DocumentChunk, Embedding)>,
    ) -> Result<Self, DomainError> {
        let dimension = entries.first().map(|(_, e)| e.dimension()).unwrap_or(0);
        if let Some((chunk, embedding)) = entries
            .iter()
            .find(|(_, e)| e.dimension() != dimension || !e.is_finite())
        {
            return Err(DomainError::retrieval(format!(
                "corpus is corrupt: chunk {} has a {}-d embedding, expected {dimension}-d finite values",
                chunk.ordinal,
                embedding.dimension()
            )));
        }

        Ok(Self {
            entries,
            embedding_model,
            dimension,
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::retrieval(format!("cannot read corpus {}: {e}", path.display()))
        })?;
        let index = Self::from_json(&raw)?;

        info!(
            path = %path.display(),
            chunks = index.entries.len(),
            dimension = index.dimension,
            "corpus loaded"
        );
        Ok(index)
    }

    pub fn from_json(raw: &str) -> Result<Self, DomainError> {
        let file: CorpusFile = serde_json::from_str(raw)
            .map_err(|e| DomainError::retrieval(format!("corpus is corrupt: {e}")))?;

        let entries = file
            .chunks
            .into_iter()
            .enumerate()
            .map(|(ordinal, record)| {
                let body = ChunkBody {
                    raw: record.content,
                    description: record.description,
                    criteria: record.criteria,
                    complete_entry: record.complete_entry,
                };
                let chunk = DocumentChunk::from_record(
                    record.id.unwrap_or_else(Uuid::new_v4),
                    ordinal,
                    body,
                    record.metadata,
                );
                (chunk, Embedding::new(record.embedding))
            })
            .collect();

        let index = Self::new(file.embedding_model, entries)?;
        if let Some(declared) = file.dimension {
            if !index.entries.is_empty() && declared != index.dimension {
                return Err(DomainError::retrieval(format!(
                    "corpus is corrupt: declares {declared}-d embeddings but stores {}-d",
                    index.dimension
                )));
            }
        }
        Ok(index)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn backend(&self) -> &'static str {
        "in_memory"
    }

    fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    fn dimension(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.dimension)
    }

    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.dimension() != self.dimension {
            return Err(DomainError::retrieval(format!(
                "query embedding is {}-d, corpus is {}-d",
                query.dimension(),
                self.dimension
            )));
        }

        let mut results: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|(chunk, embedding)| SearchResult {
                chunk: chunk.clone(),
                score: query.cosine_similarity(embedding),
            })
            .filter(|r| r.score.is_finite())
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.chunk.ordinal.cmp(&b.chunk.ordinal))
        });
        results.truncate(top_k);

        Ok(results)
    }

    async fn len(&self) -> Result<usize, DomainError> {
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CORPUS: &str = r#"{
        "embedding_model": "text-embedding-3-small",
        "dimension": 3,
        "chunks": [
            {
                "content": "DOCUMENT: DSM-5-TR; DISORDER: Major Depressive Disorder; ICD-10: F32.0; SECTION: Diagnostic Criteria; CRITERIA: Five (or more) symptoms.",
                "embedding": [1.0, 0.0, 0.0],
                "hierarchy_path": "DSM-5-TR > Depressive Disorders > Major Depressive Disorder",
                "page": 160
            },
            {
                "content": "Panic attacks are abrupt surges of fear.",
                "description": "Panic attacks are abrupt surges of fear.",
                "disorder_name": "Panic Disorder",
                "icd_code": "F41.0",
                "embedding": [0.0, 1.0, 0.0]
            },
            {
                "content": "Duplicate of the first vector.",
                "embedding": [1.0, 0.0, 0.0]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_load_decodes_legacy_and_typed_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CORPUS.as_bytes()).unwrap();

        let index = InMemoryVectorIndex::load(file.path()).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 3);
        assert_eq!(index.embedding_model(), Some("text-embedding-3-small"));

        let results = index
            .search(&Embedding::new(vec![0.0, 1.0, 0.0]), 1)
            .await
            .unwrap();
        let chunk = &results[0].chunk;
        assert_eq!(chunk.metadata.entity_name.as_deref(), Some("Panic Disorder"));
        assert_eq!(chunk.metadata.code.as_deref(), Some("F41.0"));

        let results = index
            .search(&Embedding::new(vec![1.0, 0.0, 0.0]), 1)
            .await
            .unwrap();
        let chunk = &results[0].chunk;
        assert_eq!(chunk.body.display_text(), "Five (or more) symptoms.");
        assert_eq!(chunk.metadata.source.as_deref(), Some("DSM-5-TR"));
        assert_eq!(chunk.metadata.hierarchy_path.len(), 3);
        assert_eq!(chunk.metadata.page, Some(160));
    }

    #[tokio::test]
    async fn test_ties_keep_corpus_order() {
        let index = InMemoryVectorIndex::from_json(CORPUS).unwrap();
        let results = index
            .search(&Embedding::new(vec![1.0, 0.0, 0.0]), 3)
            .await
            .unwrap();

        assert_eq!(results[0].chunk.ordinal, 0);
        assert_eq!(results[1].chunk.ordinal, 2);
        assert_eq!(results[2].chunk.ordinal, 1);
    }

    #[tokio::test]
    async fn test_top_k_larger_than_corpus() {
        let index = InMemoryVectorIndex::from_json(CORPUS).unwrap();
        let results = index
            .search(&Embedding::new(vec![0.5, 0.5, 0.0]), 50)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let index = InMemoryVectorIndex::from_json(CORPUS).unwrap();
        let err = index
            .search(&Embedding::new(vec![1.0, 0.0]), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Retrieval(_)));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let raw = r#"{"chunks": [
            {"content": "a", "embedding": [1.0, 0.0]},
            {"content": "b", "embedding": [1.0, 0.0, 0.0]}
        ]}"#;
        assert!(InMemoryVectorIndex::from_json(raw).is_err());
    }

    #[test]
    fn test_unparseable_corpus_rejected() {
        assert!(matches!(
            InMemoryVectorIndex::from_json("{not json"),
            Err(DomainError::Retrieval(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_nothing() {
        let index = InMemoryVectorIndex::from_json(r#"{"chunks": []}"#).unwrap();
        let results = index.search(&Embedding::new(vec![1.0]), 5).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(index.dimension(), None);
    }

    #[test]
    fn test_reports_stored_dimension() {
        let index = InMemoryVectorIndex::from_json(CORPUS).unwrap();
        assert_eq!(index.dimension(), Some(3));
    }
}
