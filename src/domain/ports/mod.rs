mod embedding;
mod llm;
mod vector_index;

pub use embedding::EmbeddingService;
pub use llm::{LlmService, TokenStream};
pub use vector_index::VectorIndex;
