use serde::{Deserialize, Serialize};

use super::chunk::ChunkKind;

/// A numbered source shown next to an answer. `id` equals the retrieval
/// rank (1-based) and is never renumbered within a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: usize,
    /// Display preview, truncated at a word boundary.
    #[serde(rename = "content")]
    pub preview: String,
    pub full_content: String,
    pub source: String,
    pub page: Option<u32>,
    #[serde(alias = "disorder_name")]
    pub entity_name: Option<String>,
    pub code: Option<String>,
    pub section_type: Option<String>,
    pub hierarchy_path: Vec<String>,
    /// `hierarchy_path` rendered as a readable chain.
    pub hierarchy: String,
    pub chunk_kind: Option<ChunkKind>,
    pub score: f32,
}

impl Citation {
    /// Short label for source panels, e.g. `Major Depressive Disorder (F32.0)`.
    pub fn title(&self) -> String {
        let name = self.entity_name.as_deref().unwrap_or(&self.source);
        match &self.code {
            Some(code) => format!("{name} ({code})"),
            None => name.to_string(),
        }
    }
}
