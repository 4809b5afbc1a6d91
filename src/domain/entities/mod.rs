mod chunk;
mod citation;
mod conversation;
mod embedding;
mod event;
mod prompt;

pub use chunk::{
    split_hierarchy, ChunkBody, ChunkKind, ChunkMetadata, DocumentChunk, LegacyHeader,
    SearchResult,
};
pub use citation::Citation;
pub use conversation::{ConversationTurn, MessageRole, Query};
pub use embedding::Embedding;
pub use event::StreamEvent;
pub use prompt::Prompt;
