use crate::domain::{Citation, SearchResult};

pub const HIERARCHY_SEPARATOR: &str = " > ";
const ELLIPSIS: &str = "...";
const GENERAL_SECTION: &str = "General";

/// Turns ranked search results into numbered citations.
#[derive(Debug, Clone)]
pub struct CitationFormatter {
    corpus_name: String,
    preview_chars: usize,
}

impl CitationFormatter {
    pub fn new(corpus_name: impl Into<String>, preview_chars: usize) -> Self {
        Self {
            corpus_name: corpus_name.into(),
            preview_chars,
        }
    }

    /// Ids are the 1-based ranks of `ranked`, in order.
    pub fn format(&self, ranked: &[SearchResult]) -> Vec<Citation> {
        ranked
            .iter()
            .enumerate()
            .map(|(rank, result)| self.citation(rank + 1, result))
            .collect()
    }

    fn citation(&self, id: usize, result: &SearchResult) -> Citation {
        let chunk = &result.chunk;
        let meta = &chunk.metadata;
        let full_content = chunk.body.display_text().to_string();

        let source = non_blank(&meta.source).unwrap_or_else(|| self.corpus_name.clone());
        let entity_name = non_blank(&meta.entity_name);
        let code = non_blank(&meta.code);
        let section_type = non_blank(&meta.section_type);

        let hierarchy_path = if meta.hierarchy_path.is_empty() {
            derive_hierarchy(&source, entity_name.as_deref(), section_type.as_deref())
        } else {
            meta.hierarchy_path.clone()
        };

        Citation {
            id,
            preview: truncate_preview(&full_content, self.preview_chars),
            full_content,
            source,
            page: meta.page,
            entity_name,
            code,
            section_type,
            hierarchy: hierarchy_path.join(HIERARCHY_SEPARATOR),
            hierarchy_path,
            chunk_kind: meta.chunk_kind,
            score: result.score,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn derive_hierarchy(source: &str, entity: Option<&str>, section: Option<&str>) -> Vec<String> {
    let mut path = vec![source.to_string()];
    if let Some(entity) = entity {
        path.push(entity.to_string());
        if let Some(section) = section.filter(|s| *s != GENERAL_SECTION) {
            path.push(section.to_string());
        }
    }
    path
}

/// At most `max_chars` characters of `text`, cut at the last whitespace
/// inside the bound, plus an ellipsis when anything was dropped.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let head = &text[..cut];
    let at_word_boundary = text[cut..].starts_with(char::is_whitespace);
    let head = if at_word_boundary {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(space) if space > 0 => &head[..space],
            _ => head,
        }
    };

    format!("{}{ELLIPSIS}", head.trim_end())
}
