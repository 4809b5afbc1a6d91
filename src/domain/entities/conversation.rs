use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One turn of caller-owned conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: MessageRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// A single pipeline invocation: the question plus whatever history the
/// caller chose to send. The pipeline keeps only a bounded suffix of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    /// The last `window` turns, oldest first, with blank turns dropped.
    pub fn recent_history(&self, window: usize) -> Vec<&ConversationTurn> {
        let start = self.history.len().saturating_sub(window);
        self.history[start..]
            .iter()
            .filter(|t| !t.content.trim().is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_history_keeps_suffix() {
        let history: Vec<_> = (0..10)
            .map(|i| ConversationTurn::user(format!("turn {i}")))
            .collect();
        let query = Query::new("q").with_history(history);

        let recent = query.recent_history(4);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].content, "turn 6");
        assert_eq!(recent[3].content, "turn 9");
    }

    #[test]
    fn test_recent_history_shorter_than_window() {
        let query = Query::new("q").with_history(vec![ConversationTurn::assistant("hi")]);
        assert_eq!(query.recent_history(4).len(), 1);
    }

    #[test]
    fn test_blank_turn_does_not_pull_in_older_history() {
        let query = Query::new("q").with_history(vec![
            ConversationTurn::user("oldest"),
            ConversationTurn::assistant("turn 2"),
            ConversationTurn::user("turn 3"),
            ConversationTurn::assistant("   "),
            ConversationTurn::user("turn 5"),
        ]);
        let recent: Vec<_> = query
            .recent_history(4)
            .into_iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(recent, vec!["turn 2", "turn 3", "turn 5"]);
    }

    #[test]
    fn test_turn_deserializes_without_timestamp() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"hello"}"#).unwrap();
        assert_eq!(turn.role, MessageRole::Assistant);
    }
}
