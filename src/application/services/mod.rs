mod citations;
mod context;
mod fallback;
mod pipeline;
mod retriever;
pub mod stream;

pub use citations::{truncate_preview, CitationFormatter, HIERARCHY_SEPARATOR};
pub use context::{ContextAssembler, PromptTemplates};
pub use fallback::{FallbackController, GenerationLimits};
pub use pipeline::{EventStream, PipelineSettings, QueryResponse, RagPipeline};
pub use retriever::Retriever;
pub use stream::{EventSink, PipelineState, ProtocolError, StreamEncoder, CHUNK_JOINER};
