use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::citation::Citation;

/// One frame of the answer stream. A stream always ends with exactly one
/// `ResponseComplete` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Thinking {
        status: String,
    },
    CitationsReady {
        citations: Vec<Citation>,
    },
    ResponseStart,
    ResponseChunk {
        text: String,
    },
    ResponseComplete {
        id: Uuid,
        full_text: String,
        citations: Vec<Citation>,
    },
    Error {
        id: Uuid,
        message: String,
    },
}

impl StreamEvent {
    /// Wire name of the event, also used as the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::CitationsReady { .. } => "citations_ready",
            Self::ResponseStart => "response_start",
            Self::ResponseChunk { .. } => "response_chunk",
            Self::ResponseComplete { .. } => "response_complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ResponseComplete { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tag_matches_kind() {
        let events = [
            StreamEvent::Thinking {
                status: "working".into(),
            },
            StreamEvent::ResponseStart,
            StreamEvent::ResponseChunk { text: "Hi".into() },
            StreamEvent::Error {
                id: Uuid::nil(),
                message: "failed".into(),
            },
        ];

        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.kind());
        }
    }

    #[test]
    fn test_terminal_events() {
        assert!(!StreamEvent::ResponseStart.is_terminal());
        assert!(StreamEvent::Error {
            id: Uuid::nil(),
            message: String::new()
        }
        .is_terminal());
    }
}
