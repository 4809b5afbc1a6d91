use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{errors::GenerationError, Prompt};

/// Text deltas in arrival order. Dropping the stream abandons the upstream
/// request.
pub type TokenStream = BoxStream<'static, Result<String, GenerationError>>;

#[async_trait]
pub trait LlmService: Send + Sync {
    fn model(&self) -> &str;

    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream, GenerationError>;
}
