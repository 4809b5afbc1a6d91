use serde::Serialize;

use super::conversation::ConversationTurn;

/// Role-separated prompt handed to the language model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub history: Vec<ConversationTurn>,
    pub user: String,
    /// False when no sources were available to cite.
    pub grounded: bool,
}

impl Prompt {
    /// Flattened single-string form, for logging and plain completion APIs.
    pub fn render(&self) -> String {
        let mut out = format!("System:\n{}\n\n", self.system);
        if !self.history.is_empty() {
            out.push_str("Previous conversation:\n");
            for turn in &self.history {
                out.push_str(&format!("{}: {}\n", turn.role.as_str(), turn.content));
            }
            out.push('\n');
        }
        out.push_str(&format!("User:\n{}", self.user));
        out
    }
}
