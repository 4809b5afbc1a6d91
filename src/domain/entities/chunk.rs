use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A unit of reference text produced by offline ingestion. Read-only at
/// query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    /// Position in the corpus as ingested; breaks similarity ties.
    pub ordinal: usize,
    pub body: ChunkBody,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(ordinal: usize, body: ChunkBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            ordinal,
            body,
            metadata: ChunkMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builds a chunk from a stored record, decoding the legacy labeled
    /// encoding when the record carries no typed fields.
    pub fn from_record(id: Uuid, ordinal: usize, body: ChunkBody, metadata: ChunkMetadata) -> Self {
        let (body, header) = if body.has_typed_fields() {
            (body, LegacyHeader::default())
        } else {
            ChunkBody::decode_legacy(&body.raw)
        };

        Self {
            id,
            ordinal,
            body,
            metadata: header.fill(metadata),
        }
    }
}

/// Chunk text with the displayable fields split out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkBody {
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_entry: Option<String>,
}

const LEGACY_PREFIX: &str = "DOCUMENT:";
const FIELD_SEPARATOR: &str = "; ";

impl ChunkBody {
    pub fn plain(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Self::default()
        }
    }

    pub fn has_typed_fields(&self) -> bool {
        self.description.is_some() || self.criteria.is_some() || self.complete_entry.is_some()
    }

    /// Exactly one field, in priority order: description, criteria,
    /// complete entry, raw.
    pub fn display_text(&self) -> &str {
        [&self.description, &self.criteria, &self.complete_entry]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| self.raw.trim())
    }

    /// Splits `DOCUMENT: X; DISORDER: Y; ICD-10: Z; SECTION: S; TEXT: ...`
    /// into typed fields. The payload label (`TEXT`, `CRITERIA`,
    /// `COMPLETE_ENTRY`) takes the rest of the string, semicolons included.
    pub fn decode_legacy(raw: &str) -> (Self, LegacyHeader) {
        let mut body = Self::plain(raw);
        let mut header = LegacyHeader::default();

        if !raw.trim_start().starts_with(LEGACY_PREFIX) {
            return (body, header);
        }

        let mut rest = raw.trim_start();
        while let Some((label, after)) = rest.split_once(':') {
            let label = label.trim();
            let after = after.trim_start();

            let payload = match label {
                "TEXT" => Some(&mut body.description),
                "CRITERIA" => Some(&mut body.criteria),
                "COMPLETE_ENTRY" => Some(&mut body.complete_entry),
                _ => None,
            };
            if let Some(slot) = payload {
                *slot = Some(after.trim().to_string());
                break;
            }

            let (value, next) = match after.split_once(FIELD_SEPARATOR) {
                Some((value, next)) => (value, Some(next)),
                None => (after, None),
            };
            header.set(label, value.trim());

            match next {
                Some(next) => rest = next,
                None => break,
            }
        }

        (body, header)
    }
}

/// Provenance fields recovered from a legacy-encoded chunk string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyHeader {
    pub source: Option<String>,
    pub entity_name: Option<String>,
    pub code: Option<String>,
    pub section_type: Option<String>,
}

impl LegacyHeader {
    fn set(&mut self, label: &str, value: &str) {
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return;
        }
        let slot = match label {
            "DOCUMENT" => &mut self.source,
            "DISORDER" => &mut self.entity_name,
            "ICD-10" | "ICD-11" | "CODE" => &mut self.code,
            "SECTION" => &mut self.section_type,
            _ => return,
        };
        *slot = Some(value.to_string());
    }

    /// Metadata already present on the record wins.
    pub fn fill(self, mut metadata: ChunkMetadata) -> ChunkMetadata {
        metadata.source = metadata.source.or(self.source);
        metadata.entity_name = metadata.entity_name.or(self.entity_name);
        metadata.code = metadata.code.or(self.code);
        metadata.section_type = metadata.section_type.or(self.section_type);
        metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "disorder_name")]
    pub entity_name: Option<String>,
    #[serde(default, alias = "icd_code")]
    pub code: Option<String>,
    #[serde(default)]
    pub section_type: Option<String>,
    #[serde(default, deserialize_with = "hierarchy_path")]
    pub hierarchy_path: Vec<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, alias = "chunk_type")]
    pub chunk_kind: Option<ChunkKind>,
}

/// Accepts either a list of labels or a `" > "`-joined chain.
fn hierarchy_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<String>),
        Chain(String),
    }

    Ok(match Option::<Repr>::deserialize(deserializer)? {
        Some(Repr::List(labels)) => labels,
        Some(Repr::Chain(chain)) => split_hierarchy(&chain),
        None => Vec::new(),
    })
}

pub fn split_hierarchy(chain: &str) -> Vec<String> {
    chain
        .split('>')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Parent,
    Child,
    Section,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}
