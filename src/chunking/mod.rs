pub mod generic;
pub mod java;
pub mod markdown;
pub mod pdf;

use std::collections::HashMap;

use crate::config::ChunkingConfig;
use crate::types::{meta_keys, Fragment};

pub use generic::GenericSplitter;
pub use java::JavaSplitter;
pub use markdown::MarkdownSplitter;
pub use pdf::PdfLoader;

/// A loaded document: raw content plus identity metadata set by the
/// Ingestor before the Chunker ever sees it (source path, filename, file type).
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>, file_type: impl Into<String>) -> Self {
        let source = source.into();
        let filename = std::path::Path::new(&source)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| source.clone());
        let mut metadata = HashMap::new();
        metadata.insert(meta_keys::SOURCE.to_string(), source);
        metadata.insert(meta_keys::FILENAME.to_string(), filename);
        metadata.insert(meta_keys::FILE_TYPE.to_string(), file_type.into());
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// Capability interface for turning a loaded document into fragments. A
/// tagged dispatch over splitter kinds (see `chunk`) stands in for the
/// inheritance hierarchy the original splitter framework used — there is no
/// shared base class, just this one function signature per kind (§9).
pub trait Splitter: Send + Sync {
    fn split(&self, document: &Document) -> Vec<Fragment>;
}

/// Character-based token estimator used throughout the Chunker: 1 token ≈ 4 chars.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Dispatch a loaded document to the appropriate splitter by `file_type`,
/// attach `chunk_index`/`total_chunks` metadata, and return the ordered
/// fragment list (§4.1). Any splitter panic or empty input yields an empty
/// list rather than propagating — failures are logged by the caller
/// (Ingestor) and the run continues.
pub fn chunk(document: &Document, config: &ChunkingConfig) -> Vec<Fragment> {
    if document.content.trim().is_empty() {
        return Vec::new();
    }

    let file_type = document
        .metadata
        .get(meta_keys::FILE_TYPE)
        .map(String::as_str)
        .unwrap_or("");

    let mut fragments = match file_type.to_lowercase().as_str() {
        "java" => JavaSplitter::new(config.java_max_tokens).split(document),
        "md" | "markdown" => MarkdownSplitter::new(config.markdown_max_tokens).split(document),
        "pdf" => PdfLoader.split(document),
        _ => GenericSplitter::new(config.generic_max_tokens, config.generic_overlap_tokens).split(document),
    };

    let total = fragments.len() as u32;
    for (idx, fragment) in fragments.iter_mut().enumerate() {
        fragment.metadata.insert(meta_keys::CHUNK_INDEX.to_string(), idx.to_string());
        fragment.metadata.insert(meta_keys::TOTAL_CHUNKS.to_string(), total.to_string());
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;

    fn cfg() -> ChunkingConfig {
        ChunkingConfig {
            java_max_tokens: 1500,
            markdown_max_tokens: 1000,
            generic_max_tokens: 1000,
            generic_overlap_tokens: 100,
        }
    }

    #[test]
    fn empty_document_yields_no_fragments() {
        let doc = Document::new("   \n  ", "/a/Empty.java", "java");
        assert!(chunk(&doc, &cfg()).is_empty());
    }

    #[test]
    fn chunk_index_is_contiguous() {
        let content = "# A\nfoo\n\n# B\nbar\n\n# C\nbaz\n";
        let doc = Document::new(content, "/a/doc.md", "md");
        let fragments = chunk(&doc, &cfg());
        let indices: Vec<u32> = fragments.iter().map(|f| f.chunk_index().unwrap()).collect();
        let expected: Vec<u32> = (0..fragments.len() as u32).collect();
        assert_eq!(indices, expected);
        let total = fragments[0].total_chunks().unwrap();
        assert_eq!(total as usize, fragments.len());
    }
}
