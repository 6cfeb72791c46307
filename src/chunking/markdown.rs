use std::sync::LazyLock;

use regex::Regex;

use super::{estimate_tokens, Document, Splitter};
use crate::types::{meta_keys, Fragment};

static ATX_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{1,6}\s").expect("ATX header regex is valid")
});

struct Section {
    heading: Option<String>,
    body: String,
}

/// Markdown splitter (§4.1). Detects ATX headers at line start, collects
/// each header plus the body up to the next header into a section, then
/// greedily packs sections into fragments bounded by a token budget. A
/// single over-sized section becomes its own fragment.
pub struct MarkdownSplitter {
    max_tokens: usize,
}

impl MarkdownSplitter {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens: max_tokens.max(1) }
    }

    fn split_into_sections(content: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current_heading: Option<String> = None;
        let mut current_lines: Vec<&str> = Vec::new();

        for line in content.lines() {
            if ATX_HEADER_RE.is_match(line) {
                if current_heading.is_some() || !current_lines.is_empty() {
                    sections.push(Section {
                        heading: current_heading.take(),
                        body: current_lines.join("\n"),
                    });
                    current_lines.clear();
                }
                current_heading = Some(line.trim().to_string());
            } else {
                current_lines.push(line);
            }
        }

        if current_heading.is_some() || !current_lines.is_empty() {
            sections.push(Section {
                heading: current_heading,
                body: current_lines.join("\n"),
            });
        }

        sections
    }
}

fn section_text(section: &Section) -> String {
    match &section.heading {
        Some(h) => {
            if section.body.trim().is_empty() {
                h.clone()
            } else {
                format!("{}\n{}", h, section.body)
            }
        }
        None => section.body.clone(),
    }
}

impl Splitter for MarkdownSplitter {
    fn split(&self, document: &Document) -> Vec<Fragment> {
        let sections = Self::split_into_sections(&document.content);
        if sections.is_empty() {
            return Vec::new();
        }

        let mut fragments = Vec::new();
        let mut current = String::new();

        for section in &sections {
            let text = section_text(section);
            let seg_tokens = estimate_tokens(&text);

            if !current.is_empty() && estimate_tokens(&current) + seg_tokens > self.max_tokens {
                fragments.push(make_fragment(&current, document));
                current.clear();
            }

            if seg_tokens > self.max_tokens {
                if !current.is_empty() {
                    fragments.push(make_fragment(&current, document));
                    current.clear();
                }
                fragments.push(make_fragment(&text, document));
                continue;
            }

            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&text);
        }

        if !current.trim().is_empty() {
            fragments.push(make_fragment(&current, document));
        }

        fragments
    }
}

fn make_fragment(content: &str, document: &Document) -> Fragment {
    let mut fragment = Fragment::new(content.to_string());
    fragment.metadata = document.metadata.clone();
    fragment.metadata.insert(meta_keys::CHUNK_TYPE.to_string(), "markdown".to_string());
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_small_sections_together() {
        let content = "# A\nfoo\n\n## B\nbar\n\n## C\nbaz\n";
        let doc = Document::new(content, "/docs/readme.md", "md");
        let fragments = MarkdownSplitter::new(1000).split(&doc);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].chunk_type(), "markdown");
    }

    #[test]
    fn oversized_section_becomes_its_own_fragment() {
        let big_body = "x".repeat(10_000);
        let content = format!("# Small\nhi\n\n# Big\n{}\n", big_body);
        let doc = Document::new(content, "/docs/readme.md", "md");
        let fragments = MarkdownSplitter::new(100).split(&doc);
        assert!(fragments.len() >= 2);
        assert!(fragments.iter().any(|f| f.content.contains(&big_body)));
    }

    #[test]
    fn no_headers_yields_single_fragment() {
        let doc = Document::new("just plain text\nmore text\n", "/docs/notes.md", "md");
        let fragments = MarkdownSplitter::new(1000).split(&doc);
        assert_eq!(fragments.len(), 1);
    }
}
