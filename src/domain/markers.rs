//! Inline citation markers (`^N`) as a renderer reads them.
//!
//! The generator is not hard-constrained to valid ids, so a marker that does
//! not name one of the `1..=K` citations of the response is kept as literal
//! text instead of being turned into a link.

use std::collections::BTreeSet;

const MARKER: char = '^';
/// Longer digit runs cannot name a citation.
const MAX_MARKER_DIGITS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Citation(usize),
}

/// Splits `text` into literal runs and valid citation references.
/// Adjacent literal text is returned as one segment.
pub fn segment(text: &str, citation_count: usize) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(MARKER) {
        let caret = cursor + offset;
        let digits_start = caret + MARKER.len_utf8();
        let digits_len = text[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let digits_end = digits_start + digits_len;

        match parse_id(&text[digits_start..digits_end], citation_count) {
            Some(id) => {
                if literal_start < caret {
                    segments.push(Segment::Text(&text[literal_start..caret]));
                }
                segments.push(Segment::Citation(id));
                literal_start = digits_end;
                cursor = digits_end;
            }
            None => cursor = digits_start,
        }
    }

    if literal_start < text.len() {
        segments.push(Segment::Text(&text[literal_start..]));
    }
    segments
}

/// Valid citation ids referenced anywhere in `text`.
pub fn cited_ids(text: &str, citation_count: usize) -> BTreeSet<usize> {
    segment(text, citation_count)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Citation(id) => Some(id),
            Segment::Text(_) => None,
        })
        .collect()
}

fn parse_id(digits: &str, citation_count: usize) -> Option<usize> {
    if digits.is_empty() || digits.len() > MAX_MARKER_DIGITS {
        return None;
    }
    digits
        .parse::<usize>()
        .ok()
        .filter(|id| (1..=citation_count).contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_valid_markers() {
        let segments = segment("Five symptoms^1 for two weeks^2.", 2);
        assert_eq!(
            segments,
            vec![
                Segment::Text("Five symptoms"),
                Segment::Citation(1),
                Segment::Text(" for two weeks"),
                Segment::Citation(2),
                Segment::Text("."),
            ]
        );
    }

    #[test]
    fn test_out_of_range_marker_is_literal() {
        let segments = segment("Claim^7 and^0 more", 3);
        assert_eq!(segments, vec![Segment::Text("Claim^7 and^0 more")]);
    }

    #[test]
    fn test_caret_without_digits_is_literal() {
        assert_eq!(segment("x^y ^", 1), vec![Segment::Text("x^y ^")]);
    }

    #[test]
    fn test_overflowing_marker_is_literal() {
        let text = "see^99999999999999999999999";
        assert_eq!(segment(text, 5), vec![Segment::Text(text)]);
    }

    #[test]
    fn test_no_citations_means_all_literal() {
        assert_eq!(segment("a^1", 0), vec![Segment::Text("a^1")]);
    }

    #[test]
    fn test_adjacent_markers() {
        assert_eq!(
            segment("^1^2", 2),
            vec![Segment::Citation(1), Segment::Citation(2)]
        );
    }

    #[test]
    fn test_multibyte_text_around_markers() {
        let segments = segment("Trastorno depresivo mayor — criterios^1…", 1);
        assert_eq!(segments[1], Segment::Citation(1));
        assert_eq!(segments[2], Segment::Text("…"));
    }

    #[test]
    fn test_cited_ids_deduplicates() {
        let ids = cited_ids("a^2 b^1 c^2 d^9", 3);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }
}
