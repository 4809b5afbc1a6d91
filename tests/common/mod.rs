#![allow(dead_code)]

use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use grounded_rag::application::services::{
    CitationFormatter, ContextAssembler, FallbackController, GenerationLimits, PipelineSettings,
    PromptTemplates, RagPipeline, Retriever,
};
use grounded_rag::domain::{
    ports::{EmbeddingService, LlmService, TokenStream, VectorIndex},
    DomainError, Embedding, GenerationError, Prompt, SearchResult,
};
use grounded_rag::infrastructure::InMemoryVectorIndex;

pub const MODEL: &str = "text-embedding-3-small";

pub const CORPUS: &str = r#"{
    "embedding_model": "text-embedding-3-small",
    "chunks": [
        {
            "content": "DOCUMENT: DSM-5-TR; DISORDER: Major Depressive Disorder; ICD-10: F32.0; SECTION: Diagnostic Criteria; CRITERIA: A. Five (or more) of the following symptoms have been present during the same 2-week period.",
            "embedding": [1.0, 0.0, 0.0],
            "page": 160
        },
        {
            "content": "Persistent depressive disorder",
            "description": "Depressed mood for most of the day, for more days than not, for at least 2 years.",
            "disorder_name": "Persistent Depressive Disorder",
            "icd_code": "F34.1",
            "section_type": "Diagnostic Criteria",
            "embedding": [0.9, 0.1, 0.0]
        },
        {
            "content": "DOCUMENT: DSM-5-TR; DISORDER: Panic Disorder; ICD-10: F41.0; SECTION: Diagnostic Features; TEXT: Recurrent unexpected panic attacks.",
            "embedding": [0.0, 1.0, 0.0]
        }
    ]
}"#;

/// Questions mentioning panic land on the panic axis, the rest on depression.
pub struct KeywordEncoder;

#[async_trait]
impl EmbeddingService for KeywordEncoder {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        if text.contains("panic") {
            Ok(Embedding::new(vec![0.0, 1.0, 0.0]))
        } else {
            Ok(Embedding::new(vec![1.0, 0.0, 0.0]))
        }
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_id(&self) -> &str {
        MODEL
    }
}

pub struct UnreachableIndex;

#[async_trait]
impl VectorIndex for UnreachableIndex {
    fn backend(&self) -> &'static str {
        "unreachable"
    }

    fn embedding_model(&self) -> Option<&str> {
        Some(MODEL)
    }

    async fn search(&self, _query: &Embedding, _top_k: usize) -> Result<Vec<SearchResult>, DomainError> {
        Err(DomainError::retrieval("connection refused"))
    }

    async fn len(&self) -> Result<usize, DomainError> {
        Err(DomainError::retrieval("connection refused"))
    }
}

/// Sets its flag when dropped together with the stream that owns it.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub enum Tail {
    End,
    Hang,
}

pub struct ScriptedLlm {
    pub deltas: Vec<Result<String, GenerationError>>,
    pub tail: Tail,
    pub fail_to_open: Option<GenerationError>,
    pub stalls_on_open: bool,
    pub seen: Mutex<Vec<Prompt>>,
    pub dropped: Arc<AtomicBool>,
}

impl ScriptedLlm {
    pub fn new(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| Ok(d.to_string())).collect(),
            tail: Tail::End,
            fail_to_open: None,
            stalls_on_open: false,
            seen: Mutex::new(Vec::new()),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn then(mut self, delta: Result<String, GenerationError>) -> Self {
        self.deltas.push(delta);
        self
    }

    pub fn hanging(mut self) -> Self {
        self.tail = Tail::Hang;
        self
    }

    /// The request never gets a response; the open call waits forever.
    pub fn stalled(mut self) -> Self {
        self.stalls_on_open = true;
        self
    }

    pub fn last_prompt(&self) -> Prompt {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream, GenerationError> {
        self.seen.lock().unwrap().push(prompt.clone());
        if let Some(err) = &self.fail_to_open {
            return Err(err.clone());
        }
        if self.stalls_on_open {
            let _guard = DropFlag(self.dropped.clone());
            return std::future::pending().await;
        }

        let guard = DropFlag(self.dropped.clone());
        let head = stream::iter(self.deltas.clone());
        let tokens = match self.tail {
            Tail::End => head.boxed(),
            Tail::Hang => head.chain(stream::pending()).boxed(),
        };
        Ok(tokens
            .map(move |delta| {
                let _guard = &guard;
                delta
            })
            .boxed())
    }
}

pub fn templates() -> PromptTemplates {
    PromptTemplates {
        grounded_system: "Answer only from the numbered sources.".into(),
        ungrounded_system: "No sources were found; answer generally without citations.".into(),
        disclaimer: "Not a replacement for professional evaluation.".into(),
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        thinking_statuses: vec!["Retrieving criteria...".into(), "Querying index...".into()],
        empty_query_message: "Please enter a question.".into(),
        disclaimer: Some("Not a replacement for professional evaluation.".into()),
        channel_capacity: 4,
    }
}

pub fn pipeline_with(
    index: Arc<dyn VectorIndex>,
    llm: Arc<ScriptedLlm>,
    idle: Duration,
) -> Arc<RagPipeline> {
    let retriever = Arc::new(Retriever::new(Arc::new(KeywordEncoder), index, 2));
    let fallback = FallbackController::new(
        retriever,
        CitationFormatter::new("DSM-5-TR", 200),
        GenerationLimits {
            total: Duration::from_secs(10),
            idle,
        },
    );
    Arc::new(RagPipeline::new(
        fallback,
        ContextAssembler::new(templates(), 4),
        llm,
        settings(),
    ))
}

pub fn corpus() -> Arc<dyn VectorIndex> {
    Arc::new(InMemoryVectorIndex::from_json(CORPUS).unwrap())
}
