use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, CountPointsBuilder, PointId, ScoredPoint, SearchPointsBuilder,
    Value,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    ports::VectorIndex, split_hierarchy, ChunkBody, ChunkKind, ChunkMetadata, DocumentChunk,
    DomainError, Embedding, SearchResult,
};

/// Query-only view of a collection populated by the ingestion job.
pub struct QdrantVectorIndex {
    client: Qdrant,
    collection: String,
    embedding_model: Option<String>,
}

impl QdrantVectorIndex {
    /// Connects and checks the collection exists. Collections are never
    /// created here: an absent one means ingestion has not run.
    pub async fn connect(
        url: &str,
        collection: &str,
        embedding_model: Option<String>,
    ) -> Result<Self, DomainError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| DomainError::external(e.to_string()))?;

        let collections = client
            .list_collections()
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        if !collections.collections.iter().any(|c| c.name == collection) {
            return Err(DomainError::retrieval(format!(
                "collection `{collection}` does not exist at {url}"
            )));
        }

        info!(%url, %collection, "connected to qdrant");
        Ok(Self {
            client,
            collection: collection.to_string(),
            embedding_model,
        })
    }
}

fn text(payload: &HashMap<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| payload.get(*key)?.as_str())
        .map(|s| s.trim())
        .find(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
        .map(str::to_string)
}

fn integer(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    payload.get(key)?.as_integer()
}

fn hierarchy(payload: &HashMap<String, Value>) -> Vec<String> {
    let Some(value) = payload.get("hierarchy_path") else {
        return Vec::new();
    };
    if let Some(chain) = value.as_str() {
        return split_hierarchy(chain);
    }
    value
        .as_list()
        .map(|labels| {
            labels
                .iter()
                .filter_map(|v| v.as_str().cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn chunk_kind(payload: &HashMap<String, Value>) -> Option<ChunkKind> {
    match text(payload, &["chunk_kind", "chunk_type"])?.as_str() {
        "parent" => Some(ChunkKind::Parent),
        "child" => Some(ChunkKind::Child),
        "section" => Some(ChunkKind::Section),
        _ => None,
    }
}

fn point_uuid(id: Option<&PointId>) -> Option<Uuid> {
    match id?.point_id_options.as_ref()? {
        PointIdOptions::Uuid(s) => s.parse().ok(),
        PointIdOptions::Num(_) => None,
    }
}

fn to_result(point: ScoredPoint) -> Option<SearchResult> {
    let payload = &point.payload;
    let raw = text(payload, &["content", "text"])?;

    let body = ChunkBody {
        raw,
        description: text(payload, &["description"]),
        criteria: text(payload, &["criteria"]),
        complete_entry: text(payload, &["complete_entry"]),
    };
    let metadata = ChunkMetadata {
        source: text(payload, &["source"]),
        entity_name: text(payload, &["entity_name", "disorder_name"]),
        code: text(payload, &["code", "icd_code"]),
        section_type: text(payload, &["section_type"]),
        hierarchy_path: hierarchy(payload),
        page: integer(payload, "page").and_then(|p| u32::try_from(p).ok()),
        chunk_kind: chunk_kind(payload),
    };

    let id = text(payload, &["chunk_id"])
        .and_then(|s| s.parse().ok())
        .or_else(|| point_uuid(point.id.as_ref()))
        .unwrap_or_else(Uuid::new_v4);
    let ordinal = integer(payload, "ordinal")
        .and_then(|o| usize::try_from(o).ok())
        .unwrap_or(usize::MAX);

    Some(SearchResult {
        chunk: DocumentChunk::from_record(id, ordinal, body, metadata),
        score: point.score,
    })
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    #[instrument(skip(self, query), fields(collection = %self.collection))]
    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.as_slice().to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| DomainError::retrieval(e.to_string()))?;

        Ok(response.result.into_iter().filter_map(to_result).collect())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| DomainError::retrieval(e.to_string()))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
