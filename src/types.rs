use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved metadata keys recognized by the Chunker, Fuser and Orchestrator.
/// The map is open-schema: callers may stash arbitrary extra keys and they
/// pass through untouched, but these names carry typed meaning.
pub mod meta_keys {
    pub const SOURCE: &str = "source";
    pub const FILENAME: &str = "filename";
    pub const FILE_TYPE: &str = "file_type";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const CHUNK_TYPE: &str = "chunk_type";
    pub const CLASS_NAME: &str = "class_name";
    pub const METHOD_NAME: &str = "method_name";
    pub const START_LINE: &str = "start_line";
    pub const END_LINE: &str = "end_line";
    pub const HYBRID_SCORE: &str = "hybrid_score";
    pub const SEMANTIC_SCORE: &str = "semantic_score";
    pub const KEYWORD_SCORE: &str = "keyword_score";
}

/// A chunk-type tag attached by the Chunker. Modeled as a tagged enum rather
/// than inheriting from a splitter base class: each variant is a plain
/// capability output, not a subtype relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkType {
    JavaCode,
    Markdown,
    PdfPage,
    Generic,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::JavaCode => "java_code",
            ChunkType::Markdown => "markdown",
            ChunkType::PdfPage => "pdf_page",
            ChunkType::Generic => "generic",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fragment — the unit of retrieval. Immutable once produced by the Chunker,
/// except for the transient score fields which the Fuser attaches on return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub content: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

impl Fragment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embedding: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source(&self) -> &str {
        self.metadata
            .get(meta_keys::SOURCE)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn filename(&self) -> &str {
        self.metadata
            .get(meta_keys::FILENAME)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn file_type(&self) -> &str {
        self.metadata
            .get(meta_keys::FILE_TYPE)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn chunk_type(&self) -> &str {
        self.metadata
            .get(meta_keys::CHUNK_TYPE)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.metadata.get(meta_keys::CLASS_NAME).map(String::as_str)
    }

    pub fn method_name(&self) -> Option<&str> {
        self.metadata.get(meta_keys::METHOD_NAME).map(String::as_str)
    }

    pub fn chunk_index(&self) -> Option<u32> {
        self.metadata.get(meta_keys::CHUNK_INDEX).and_then(|v| v.parse().ok())
    }

    pub fn total_chunks(&self) -> Option<u32> {
        self.metadata.get(meta_keys::TOTAL_CHUNKS).and_then(|v| v.parse().ok())
    }

    pub fn start_line(&self) -> Option<u32> {
        self.metadata.get(meta_keys::START_LINE).and_then(|v| v.parse().ok())
    }

    pub fn end_line(&self) -> Option<u32> {
        self.metadata.get(meta_keys::END_LINE).and_then(|v| v.parse().ok())
    }

    pub fn line_range(&self) -> Option<String> {
        match (self.start_line(), self.end_line()) {
            (Some(s), Some(e)) => Some(format!("{}-{}", s, e)),
            _ => None,
        }
    }

    /// Deduplication/fusion identity: `source || "_" || hash(content)` (§3, §4.5 Step 4).
    pub fn identity(&self) -> String {
        format!("{}_{}", self.source(), content_hash(&self.content))
    }

    pub fn set_score(&mut self, key: &str, value: f32) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn hybrid_score(&self) -> f32 {
        self.metadata
            .get(meta_keys::HYBRID_SCORE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }
}

/// Content hash used for the Fuser's cross-backend identity and for
/// re-ingestion stability checks. Not collision-resistant; see DESIGN.md.
pub fn content_hash(content: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Query — a retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,
    #[serde(default)]
    pub filters: Option<Filter>,
}

fn default_top_k() -> usize {
    5
}

fn default_threshold() -> f32 {
    0.7
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: default_top_k(),
            similarity_threshold: default_threshold(),
            filters: None,
        }
    }
}

/// Filter — AND-conjunction of optional predicates over reserved metadata
/// keys (§3). Absent/blank predicates are vacuously true.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    pub file_type: Option<String>,
    pub source_path: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
    pub filename: Option<String>,
}

impl Filter {
    /// Evaluate the filter against a fragment's metadata. Missing metadata
    /// fields are treated as empty strings: this fails equality predicates
    /// and only passes substring predicates when the filter value is itself
    /// blank (§4.5 Step 2).
    pub fn matches(&self, fragment: &Fragment) -> bool {
        equality_matches(&self.file_type, fragment.file_type())
            && substring_matches(&self.source_path, fragment.source())
            && equality_matches(&self.class_name, fragment.class_name().unwrap_or(""))
            && equality_matches(&self.method_name, fragment.method_name().unwrap_or(""))
            && substring_matches(&self.filename, fragment.filename())
    }
}

fn equality_matches(predicate: &Option<String>, actual: &str) -> bool {
    match predicate {
        None => true,
        Some(expected) => expected.eq_ignore_ascii_case(actual),
    }
}

fn substring_matches(predicate: &Option<String>, actual: &str) -> bool {
    match predicate {
        None => true,
        Some(expected) if expected.is_empty() => actual.is_empty(),
        Some(expected) => actual.contains(expected.as_str()),
    }
}

/// Ordered sequence of Fragments with transient scores attached; length ≤ top_k.
pub type RetrievalResult = Vec<Fragment>;

/// One cited source document in a Response (§4.7 Step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub citation_number: usize,
    pub content: String,
    pub hybrid_score: f32,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub metadata: String,
    pub line_range: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
}

/// response_metadata as defined in §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub documents_retrieved: usize,
    pub processing_time_ms: u128,
    pub model_label: String,
}

/// Response — the Orchestrator's final output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub answer: String,
    pub sources: Vec<SourceDocument>,
    pub response_metadata: ResponseMetadata,
}

/// Masking Record — the result of one PII Redactor invocation (§3).
/// Mappings live only for the duration of the request that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingRecord {
    pub masked_text: String,
    pub mappings: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_identity_combines_source_and_content_hash() {
        let f = Fragment::new("hello").with_meta(meta_keys::SOURCE, "/a/b.java");
        assert_eq!(f.identity(), format!("/a/b.java_{}", content_hash("hello")));
    }

    #[test]
    fn filter_blank_source_path_passes_only_blank_source() {
        let filter = Filter {
            source_path: Some(String::new()),
            ..Default::default()
        };
        let with_source = Fragment::new("x").with_meta(meta_keys::SOURCE, "/a.java");
        let without_source = Fragment::new("x");
        assert!(!filter.matches(&with_source));
        assert!(filter.matches(&without_source));
    }

    #[test]
    fn filter_file_type_is_case_insensitive() {
        let filter = Filter {
            file_type: Some("JAVA".to_string()),
            ..Default::default()
        };
        let fragment = Fragment::new("x").with_meta(meta_keys::FILE_TYPE, "java");
        assert!(filter.matches(&fragment));
    }

    #[test]
    fn filter_missing_class_name_fails_equality() {
        let filter = Filter {
            class_name: Some("Calculator".to_string()),
            ..Default::default()
        };
        let fragment = Fragment::new("x");
        assert!(!filter.matches(&fragment));
    }
}
