//! Application layer - the answer pipeline.
//!
//! Services here depend on domain ports (traits) rather than concrete
//! implementations, so the same pipeline runs against qdrant or an
//! in-memory corpus, and against any rig provider.

pub mod services;

pub use services::{
    CitationFormatter, ContextAssembler, FallbackController, QueryResponse, RagPipeline,
    Retriever,
};
