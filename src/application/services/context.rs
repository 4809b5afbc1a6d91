use crate::domain::{Citation, ConversationTurn, Prompt, Query};

/// Fixed instruction text. Values come from `prompts.yaml` with the
/// defaults in `PromptsConfig`.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    /// Role and grounding rules when sources are present.
    pub grounded_system: String,
    /// Role and rules when retrieval produced nothing.
    pub ungrounded_system: String,
    /// Standing professional disclaimer; empty disables it.
    pub disclaimer: String,
}

/// Builds the model prompt from citations, a bounded history window and
/// the current question.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    templates: PromptTemplates,
    history_window: usize,
}

impl ContextAssembler {
    pub fn new(templates: PromptTemplates, history_window: usize) -> Self {
        Self {
            templates,
            history_window,
        }
    }

    pub fn assemble(&self, citations: &[Citation], query: &Query) -> Prompt {
        let grounded = !citations.is_empty();
        let history: Vec<ConversationTurn> = query
            .recent_history(self.history_window)
            .into_iter()
            .cloned()
            .collect();

        Prompt {
            system: self.system_block(citations),
            history,
            user: user_block(citations, &query.text),
            grounded,
        }
    }

    fn system_block(&self, citations: &[Citation]) -> String {
        let mut system = if citations.is_empty() {
            self.templates.ungrounded_system.trim().to_string()
        } else {
            format!(
                "{}\n\n{}",
                self.templates.grounded_system.trim(),
                marker_rules(citations.len())
            )
        };

        let disclaimer = self.templates.disclaimer.trim();
        if !disclaimer.is_empty() {
            system.push_str("\n\nAlways close with this disclaimer: ");
            system.push_str(disclaimer);
        }
        system
    }
}

fn marker_rules(count: usize) -> String {
    let valid = if count == 1 {
        "^1".to_string()
    } else {
        format!("^1 through ^{count}")
    };
    format!(
        "CITATION RULES:\n\
         1. Place an inline marker of the form ^N immediately after every claim taken from Source N \
         (e.g. \"requires five symptoms^1\").\n\
         2. The only valid markers are {valid}. Never cite a number outside that range.\n\
         3. Use several markers when a statement combines sources.\n\
         4. If the sources do not contain the answer, say so instead of guessing."
    )
}

fn user_block(citations: &[Citation], question: &str) -> String {
    if citations.is_empty() {
        return format!("Question: {}", question.trim());
    }

    let sources = citations
        .iter()
        .map(source_block)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on these sources:\n\n{sources}\n\nQuestion: {}\n\n\
         Answer with inline citations (^1, ^2, ...).",
        question.trim()
    )
}

fn source_block(citation: &Citation) -> String {
    let mut header = format!("[Source {}] {}", citation.id, citation.title());
    if let Some(section) = &citation.section_type {
        header.push_str(" - ");
        header.push_str(section);
    }
    format!("{header}\n{}", citation.full_content)
}
