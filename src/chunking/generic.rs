use super::{estimate_tokens, Document, Splitter};
use crate::types::{meta_keys, Fragment};

/// Generic fixed-window splitter (§4.1), used for every supported file type
/// that has no dedicated structural splitter. A sliding window sized in
/// estimated tokens, snapped to a nearby paragraph/sentence/word boundary
/// rather than cut mid-word, with configurable overlap between windows.
pub struct GenericSplitter {
    max_tokens: usize,
    overlap_tokens: usize,
}

impl GenericSplitter {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            overlap_tokens: overlap_tokens.min(max_tokens.saturating_sub(1).max(0)),
        }
    }

    fn max_chars(&self) -> usize {
        self.max_tokens * 4
    }

    fn overlap_chars(&self) -> usize {
        self.overlap_tokens * 4
    }

    fn find_break_point(text: &str, start: usize, preferred_end: usize) -> usize {
        let raw_search_start = if preferred_end > 200 { preferred_end - 200 } else { start };
        let search_start = snap_to_char_boundary(text, raw_search_start);
        let safe_end = snap_to_char_boundary(text, preferred_end);

        if search_start >= safe_end {
            return safe_end;
        }

        let region = &text[search_start..safe_end];
        if let Some(pos) = region.rfind("\n\n") {
            return search_start + pos + 2;
        }
        if let Some(pos) = region.rfind(". ") {
            return search_start + pos + 2;
        }
        if let Some(pos) = region.rfind('\n') {
            return search_start + pos + 1;
        }
        if let Some(pos) = region.rfind(' ') {
            return search_start + pos + 1;
        }
        safe_end
    }
}

fn snap_to_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

impl Splitter for GenericSplitter {
    fn split(&self, document: &Document) -> Vec<Fragment> {
        let text = document.content.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let max_chars = self.max_chars();
        if estimate_tokens(text) <= self.max_tokens {
            return vec![make_fragment(text, document)];
        }

        let mut fragments = Vec::new();
        let mut start = 0usize;

        while start < text.len() {
            let raw_end = (start + max_chars).min(text.len());
            let end = if raw_end < text.len() {
                Self::find_break_point(text, start, raw_end)
            } else {
                text.len()
            };
            let end = end.max(start + 1).min(text.len());

            let chunk = text[start..end].trim();
            if !chunk.is_empty() {
                fragments.push(make_fragment(chunk, document));
            }

            let step = if end - start > self.overlap_chars() {
                end - start - self.overlap_chars()
            } else {
                end - start
            };
            let next = snap_to_char_boundary(text, start + step.max(1));
            if next <= start {
                break;
            }
            start = next;
        }

        fragments
    }
}

fn make_fragment(content: &str, document: &Document) -> Fragment {
    let mut fragment = Fragment::new(content.to_string());
    fragment.metadata = document.metadata.clone();
    fragment.metadata.insert(meta_keys::CHUNK_TYPE.to_string(), "generic".to_string());
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_fragment() {
        let doc = Document::new("a short note", "/notes.txt", "txt");
        let fragments = GenericSplitter::new(1000, 100).split(&doc);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].chunk_type(), "generic");
    }

    #[test]
    fn long_text_is_split_into_overlapping_windows() {
        let text = "word ".repeat(2000);
        let doc = Document::new(text, "/notes.txt", "txt");
        let fragments = GenericSplitter::new(100, 20).split(&doc);
        assert!(fragments.len() > 1);
    }

    #[test]
    fn empty_text_yields_no_fragments() {
        let doc = Document::new("   ", "/notes.txt", "txt");
        assert!(GenericSplitter::new(1000, 100).split(&doc).is_empty());
    }
}
