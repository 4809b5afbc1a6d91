//! Answer stream protocol.
//!
//! `StreamEncoder` is the pure state machine
//! `Init -> Retrieving -> ContextReady -> Generating -> Complete | Error`
//! that turns pipeline progress into [`StreamEvent`]s. `EventSink` pairs it
//! with the channel that carries events to the caller.
//!
//! Chunks are joined with the empty string: `ResponseComplete.full_text` is
//! the exact concatenation of every `ResponseChunk.text` in emission order.

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{Citation, StreamEvent};

/// The joiner between consecutive `ResponseChunk` texts.
pub const CHUNK_JOINER: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Retrieving,
    ContextReady,
    Generating,
    Complete,
    Error,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("`{event}` is not allowed in state {state:?}")]
    InvalidTransition {
        state: PipelineState,
        event: &'static str,
    },
    #[error("stream already terminated")]
    Terminated,
}

#[derive(Debug)]
pub struct StreamEncoder {
    response_id: Uuid,
    state: PipelineState,
    full_text: String,
    citations: Vec<Citation>,
}

impl StreamEncoder {
    pub fn new(response_id: Uuid) -> Self {
        Self {
            response_id,
            state: PipelineState::Init,
            full_text: String::new(),
            citations: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn response_id(&self) -> Uuid {
        self.response_id
    }

    fn guard(&self, event: &'static str, allowed: &[PipelineState]) -> Result<(), ProtocolError> {
        if self.state.is_terminal() {
            return Err(ProtocolError::Terminated);
        }
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ProtocolError::InvalidTransition {
                state: self.state,
                event,
            })
        }
    }

    /// Progress note while retrieving. The first one starts the pipeline.
    pub fn thinking(&mut self, status: impl Into<String>) -> Result<StreamEvent, ProtocolError> {
        self.guard("thinking", &[PipelineState::Init, PipelineState::Retrieving])?;
        self.state = PipelineState::Retrieving;
        Ok(StreamEvent::Thinking {
            status: status.into(),
        })
    }

    pub fn citations_ready(
        &mut self,
        citations: Vec<Citation>,
    ) -> Result<StreamEvent, ProtocolError> {
        self.guard("citations_ready", &[PipelineState::Retrieving])?;
        self.state = PipelineState::ContextReady;
        self.citations = citations.clone();
        Ok(StreamEvent::CitationsReady { citations })
    }

    pub fn response_start(&mut self) -> Result<StreamEvent, ProtocolError> {
        self.guard("response_start", &[PipelineState::ContextReady])?;
        self.state = PipelineState::Generating;
        Ok(StreamEvent::ResponseStart)
    }

    pub fn chunk(&mut self, text: impl Into<String>) -> Result<StreamEvent, ProtocolError> {
        self.guard("response_chunk", &[PipelineState::Generating])?;
        let text = text.into();
        if !self.full_text.is_empty() {
            self.full_text.push_str(CHUNK_JOINER);
        }
        self.full_text.push_str(&text);
        Ok(StreamEvent::ResponseChunk { text })
    }

    pub fn complete(&mut self) -> Result<StreamEvent, ProtocolError> {
        self.guard("response_complete", &[PipelineState::Generating])?;
        self.state = PipelineState::Complete;
        Ok(StreamEvent::ResponseComplete {
            id: self.response_id,
            full_text: std::mem::take(&mut self.full_text),
            citations: std::mem::take(&mut self.citations),
        })
    }

    /// Allowed from any non-terminal state.
    pub fn error(&mut self, message: impl Into<String>) -> Result<StreamEvent, ProtocolError> {
        if self.state.is_terminal() {
            return Err(ProtocolError::Terminated);
        }
        self.state = PipelineState::Error;
        self.full_text.clear();
        Ok(StreamEvent::Error {
            id: self.response_id,
            message: message.into(),
        })
    }
}

/// The caller dropped the stream.
#[derive(Debug, Error)]
#[error("event stream closed by caller")]
pub struct StreamClosed;

/// Encoder plus the channel to the caller.
pub struct EventSink {
    encoder: StreamEncoder,
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    pub fn new(response_id: Uuid, tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            encoder: StreamEncoder::new(response_id),
            tx,
        }
    }

    pub fn encoder(&self) -> &StreamEncoder {
        &self.encoder
    }

    /// Resolves once the caller has dropped the receiving side.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Encodes one transition and delivers it.
    ///
    /// A protocol violation is a programming error in the pipeline; it is
    /// logged and the offending event is dropped so the stream keeps its
    /// single-terminal guarantee.
    pub async fn emit(
        &mut self,
        encode: impl FnOnce(&mut StreamEncoder) -> Result<StreamEvent, ProtocolError>,
    ) -> Result<(), StreamClosed> {
        match encode(&mut self.encoder) {
            Ok(event) => self.tx.send(event).await.map_err(|_| StreamClosed),
            Err(e) => {
                tracing::error!(error = %e, response_id = %self.encoder.response_id, "stream protocol violation");
                Ok(())
            }
        }
    }
}
