use async_trait::async_trait;
use futures::StreamExt;
use rig::client::CompletionClient;
use rig::completion::{CompletionError, CompletionModel, Message};
use rig::streaming::{StreamedAssistantContent, StreamingCompletion};
use tracing::instrument;

use crate::domain::{
    ports::{LlmService, TokenStream},
    GenerationError, MessageRole, Prompt,
};
use crate::infrastructure::config::LlmConfig;

/// Streams completions from any rig provider client.
pub struct RigLlm<C> {
    client: C,
    model: String,
    temperature: f64,
    max_tokens: u64,
}

impl<C> RigLlm<C>
where
    C: CompletionClient,
{
    pub fn new(client: C, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

fn to_message(role: MessageRole, content: &str) -> Message {
    match role {
        MessageRole::User => Message::user(content),
        MessageRole::Assistant => Message::assistant(content),
    }
}

fn classify(err: CompletionError) -> GenerationError {
    match err {
        CompletionError::HttpError(e) => GenerationError::Unavailable(e.to_string()),
        other => GenerationError::classify(other.to_string()),
    }
}

#[async_trait]
impl<C> LlmService for RigLlm<C>
where
    C: CompletionClient + Send + Sync + 'static,
    C::CompletionModel: 'static,
    <C::CompletionModel as CompletionModel>::StreamingResponse: Send + 'static,
{
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, grounded = prompt.grounded))]
    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream, GenerationError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(&prompt.system)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build();

        let history: Vec<Message> = prompt
            .history
            .iter()
            .map(|turn| to_message(turn.role, &turn.content))
            .collect();

        let response = agent
            .stream_completion(prompt.user.as_str(), history)
            .await
            .map_err(classify)?
            .stream()
            .await
            .map_err(classify)?;

        let deltas = response.filter_map(|item| async move {
            match item {
                Ok(StreamedAssistantContent::Text(text)) => Some(Ok(text.text)),
                Ok(_) => None,
                Err(e) => Some(Err(classify(e))),
            }
        });

        Ok(deltas.boxed())
    }
}
