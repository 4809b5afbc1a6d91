use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, Instrument};
use uuid::Uuid;

use crate::application::services::{
    stream::{EventSink, StreamClosed},
    ContextAssembler, FallbackController,
};
use crate::domain::{
    ports::LlmService, Citation, DomainError, GenerationError, Query, StreamEvent,
};

pub type EventStream = BoxStream<'static, StreamEvent>;

/// Final answer for callers that do not stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub id: Uuid,
    pub response: String,
    pub citations: Vec<Citation>,
    /// False when the answer was produced without any retrieved source.
    pub grounded: bool,
    pub disclaimer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Shown while retrieval runs, in order.
    pub thinking_statuses: Vec<String>,
    pub empty_query_message: String,
    pub disclaimer: Option<String>,
    pub channel_capacity: usize,
}

/// Query -> retrieval -> citations -> prompt -> generation -> events.
///
/// Holds only shared, read-only collaborators, so one instance serves every
/// concurrent invocation.
pub struct RagPipeline {
    fallback: FallbackController,
    assembler: ContextAssembler,
    llm: Arc<dyn LlmService>,
    settings: PipelineSettings,
}

impl RagPipeline {
    pub fn new(
        fallback: FallbackController,
        assembler: ContextAssembler,
        llm: Arc<dyn LlmService>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fallback,
            assembler,
            llm,
            settings,
        }
    }

    /// Ranked citations without generation.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Citation>, DomainError> {
        let k = limit.unwrap_or_else(|| self.fallback.retriever().default_top_k());
        self.fallback.search(query, k).await
    }

    /// Number of chunks the index serves.
    pub async fn indexed_chunks(&self) -> Result<usize, DomainError> {
        self.fallback.retriever().index().len().await
    }

    /// Starts answering `query` and returns its event stream.
    ///
    /// The work runs on its own task. Dropping the returned stream stops it
    /// and releases the upstream model stream.
    pub fn process_query(self: &Arc<Self>, query: Query) -> EventStream {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let response_id = Uuid::new_v4();
        let pipeline = Arc::clone(self);
        let span = tracing::info_span!("process_query", %response_id);

        tokio::spawn(
            async move {
                let sink = EventSink::new(response_id, tx);
                if pipeline.run(query, sink).await.is_err() {
                    info!("caller went away; generation cancelled");
                }
            }
            .instrument(span),
        );

        ReceiverStream::new(rx).boxed()
    }

    /// Runs the stream to its end and returns the final answer.
    #[instrument(skip(self, query))]
    pub async fn answer(self: &Arc<Self>, query: Query) -> Result<QueryResponse, DomainError> {
        if query.text.trim().is_empty() {
            return Err(DomainError::validation(
                self.settings.empty_query_message.clone(),
            ));
        }

        let mut events = self.process_query(query);
        let mut grounded = false;

        while let Some(event) = events.next().await {
            match event {
                StreamEvent::CitationsReady { citations } => grounded = !citations.is_empty(),
                StreamEvent::ResponseComplete {
                    id,
                    full_text,
                    citations,
                } => {
                    return Ok(QueryResponse {
                        id,
                        response: full_text,
                        citations,
                        grounded,
                        disclaimer: self.settings.disclaimer.clone(),
                    })
                }
                StreamEvent::Error { message, .. } => {
                    return Err(DomainError::AnswerFailed(message))
                }
                _ => {}
            }
        }

        Err(DomainError::internal("answer stream ended without a terminal event"))
    }

    async fn run(&self, query: Query, mut sink: EventSink) -> Result<(), StreamClosed> {
        if query.text.trim().is_empty() {
            let message = self.settings.empty_query_message.clone();
            return sink.emit(|e| e.error(message)).await;
        }

        for status in &self.settings.thinking_statuses {
            sink.emit(|e| e.thinking(status.as_str())).await?;
        }
        if self.settings.thinking_statuses.is_empty() {
            sink.emit(|e| e.thinking("Retrieving")).await?;
        }

        let citations = tokio::select! {
            _ = sink.closed() => return Err(StreamClosed),
            citations = self.fallback.ground(&query.text) => citations,
        };
        let prompt = self.assembler.assemble(&citations, &query);
        debug!(
            grounded = prompt.grounded,
            citations = citations.len(),
            history = prompt.history.len(),
            "context assembled"
        );
        sink.emit(|e| e.citations_ready(citations)).await?;

        let deadline = Instant::now() + self.fallback.limits().total;
        let opened = tokio::select! {
            _ = sink.closed() => return Err(StreamClosed),
            opened = self.fallback.open_stream(self.llm.as_ref(), &prompt, deadline) => opened,
        };
        let mut tokens = match opened {
            Ok(tokens) => tokens,
            Err(err) => return self.fail(&mut sink, &err).await,
        };
        sink.emit(|e| e.response_start()).await?;

        loop {
            let next = tokio::select! {
                _ = sink.closed() => return Err(StreamClosed),
                next = self.fallback.next_delta(&mut tokens, deadline) => next,
            };

            match next {
                Ok(Some(text)) if text.is_empty() => continue,
                Ok(Some(text)) => sink.emit(|e| e.chunk(text)).await?,
                Ok(None) => break,
                Err(err) => {
                    drop(tokens);
                    return self.fail(&mut sink, &err).await;
                }
            }
        }

        sink.emit(|e| e.complete()).await?;
        info!(model = self.llm.model(), "response complete");
        Ok(())
    }

    async fn fail(&self, sink: &mut EventSink, err: &GenerationError) -> Result<(), StreamClosed> {
        let message = self.fallback.generation_failure(err);
        sink.emit(|e| e.error(message)).await
    }
}
