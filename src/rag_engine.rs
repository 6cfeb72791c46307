//! C7 — RAG Orchestrator (§4.7). Composes redaction → hybrid retrieval →
//! context assembly → generator call → citation binding. This is the one
//! place in the core that talks to every other component.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::config::RagConfig;
use crate::embeddings::e5::{E5Config, E5Embeddings};
use crate::embeddings::{download, EmbeddingModel};
use crate::error::RagError;
use crate::ingest::Ingestor;
use crate::llm::{GenerationConfig, Generator};
use crate::pii::PiiRedactor;
use crate::search::{HybridFuser, LexicalSearch, SemanticSearch, TextSearch};
use crate::storage::LanceStore;
use crate::types::{meta_keys, Query, Response, ResponseMetadata, SourceDocument};

const SYSTEM_INSTRUCTION: &str = "\
You are a grounded question-answering assistant for a software repository. Answer only from \
the provided context. Cite sources inline using their citation numbers, e.g. [1], [2]. If the \
context does not contain enough information to answer confidently, say so explicitly rather \
than guessing.";

const CONTEXT_DELIMITER: &str = "\n---\n";
const CITATION_CONTENT_TRUNCATE_CHARS: usize = 200;
const NO_RESULTS_ANSWER: &str =
    "I don't have enough relevant information in the indexed repository to answer that.";
const GENERATOR_ERROR_ANSWER: &str =
    "The answer generator is currently unavailable; here are the retrieved sources instead.";

pub struct RagEngine {
    config: RagConfig,
    pii: PiiRedactor,
    fuser: HybridFuser,
    generator: Arc<dyn Generator>,
    ingestor: Ingestor,
}

impl RagEngine {
    pub async fn new(config: RagConfig, generator: Arc<dyn Generator>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir).ok();

        let lance_path = config.data_dir.join("lance_data");
        let store = Arc::new(
            LanceStore::new(lance_path.to_str().unwrap_or("./lance_data"), config.embedding.dimension)
                .await
                .context("failed to initialize vector store")?,
        );

        let lexical_index = Arc::new(
            TextSearch::new(config.data_dir.to_str().unwrap_or("./data"))
                .context("failed to initialize lexical index")?,
        );

        if E5Config::auto_detect(&config.embedding.model_dir).is_none() {
            download::ensure_e5_model(&config.embedding.model_dir)
                .await
                .context("failed to auto-download embedding model")?;
        }
        let e5_config = E5Config::auto_detect(&config.embedding.model_dir)
            .ok_or_else(|| anyhow::anyhow!("embedding model not found at {}", config.embedding.model_dir.display()))?;
        let embeddings: Arc<dyn EmbeddingModel> =
            Arc::new(E5Embeddings::new(e5_config).context("failed to load embedding model")?);

        let semantic = Box::new(SemanticSearch::new(store.clone(), embeddings.clone()));
        let lexical = Box::new(LexicalSearch::new(lexical_index.clone(), store.clone()));
        let fuser = HybridFuser::new(semantic, lexical, config.hybrid.clone());

        let ingestor = Ingestor::new(store.clone(), lexical_index.clone(), embeddings.clone(), config.clone());

        Ok(Self {
            config,
            pii: PiiRedactor::new(),
            fuser,
            generator,
            ingestor,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Public entry point (§4.7). Redaction happens even when it changes
    /// nothing observable downstream — the masked text is simply what gets
    /// searched and handed to the generator.
    pub async fn chat(&self, query: &Query) -> Response {
        let (response, _context) = self.chat_with_context(query).await;
        response
    }

    /// Same as `chat`, but also returns the raw (untruncated) assembled
    /// context string — the Evaluator (§4.8) needs it for the faithfulness
    /// judge call, but it is never part of the user-visible `Response`.
    pub async fn chat_with_context(&self, query: &Query) -> (Response, String) {
        let started = Instant::now();

        // Step 1 — mask PII in the query before it touches retrieval or the
        // generator. The reverse mapping is request-scoped and discarded;
        // the Orchestrator never restores PII in outbound responses (§4.7).
        let masked = if self.config.features.enable_pii_redaction {
            self.pii.mask(&query.text)
        } else {
            crate::types::MaskingRecord { masked_text: query.text.clone(), mappings: Default::default() }
        };

        // Step 2 — hybrid retrieval.
        let results = self
            .fuser
            .search(&masked.masked_text, query.top_k, query.similarity_threshold, query.filters.as_ref())
            .await;

        if results.is_empty() {
            let response = Response {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
                response_metadata: ResponseMetadata {
                    documents_retrieved: 0,
                    processing_time_ms: started.elapsed().as_millis(),
                    model_label: self.generator.label(),
                },
            };
            return (response, String::new());
        }

        // Step 3 — context assembly.
        let context = assemble_context(&results);

        // Step 4 — generator call, with its own timeout (§5). A timeout or
        // transport failure degrades to a canonical error answer; sources
        // are still returned (§4.7 Step 6, §7).
        let timeout = Duration::from_millis(self.config.generator.timeout_ms);
        let user_prompt = format!("QUESTION: {}\n\nCONTEXT:\n{}", masked.masked_text, context);
        let answer = match tokio::time::timeout(
            timeout,
            self.generator.generate(SYSTEM_INSTRUCTION, &user_prompt, &GenerationConfig::default()),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "orchestrator: generator call failed");
                GENERATOR_ERROR_ANSWER.to_string()
            }
            Err(_) => {
                tracing::warn!("orchestrator: generator call timed out");
                GENERATOR_ERROR_ANSWER.to_string()
            }
        };

        // Step 5 — build the Response with citation-bound sources.
        let sources: Vec<SourceDocument> = results
            .iter()
            .enumerate()
            .map(|(idx, fragment)| SourceDocument {
                citation_number: idx + 1,
                content: truncate_with_ellipsis(&fragment.content, CITATION_CONTENT_TRUNCATE_CHARS),
                hybrid_score: fragment.hybrid_score(),
                semantic_score: score_of(fragment, meta_keys::SEMANTIC_SCORE),
                keyword_score: score_of(fragment, meta_keys::KEYWORD_SCORE),
                metadata: flatten_metadata(fragment),
                line_range: fragment.line_range(),
                class_name: fragment.class_name().map(str::to_string),
                method_name: fragment.method_name().map(str::to_string),
            })
            .collect();

        let response = Response {
            answer,
            response_metadata: ResponseMetadata {
                documents_retrieved: sources.len(),
                processing_time_ms: started.elapsed().as_millis(),
                model_label: self.generator.label(),
            },
            sources,
        };

        (response, context)
    }

    /// C2 — Ingestor entry point. A fully unreadable walk root is surfaced
    /// to the caller as a 500-mapped `RagError` (§7); per-file failures are
    /// handled internally by the Ingestor.
    pub async fn ingest(&self, root: &Path) -> Result<usize, RagError> {
        self.ingestor.ingest_path(root).await
    }
}

fn assemble_context(fragments: &[crate::types::Fragment]) -> String {
    fragments
        .iter()
        .map(|f| format!("source: {}\nfilename: {}\n{}", f.source(), f.filename(), f.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

fn score_of(fragment: &crate::types::Fragment, key: &str) -> f32 {
    fragment.metadata.get(key).and_then(|v| v.parse().ok()).unwrap_or(0.0)
}

const STRUCTURAL_METADATA_KEYS: &[&str] = &[
    meta_keys::CLASS_NAME,
    meta_keys::METHOD_NAME,
    meta_keys::START_LINE,
    meta_keys::END_LINE,
    meta_keys::CHUNK_TYPE,
];

fn flatten_metadata(fragment: &crate::types::Fragment) -> String {
    STRUCTURAL_METADATA_KEYS
        .iter()
        .filter_map(|key| fragment.metadata.get(*key).map(|v| format!("{}={}", key, v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{meta_keys, Fragment};

    #[test]
    fn truncation_adds_ellipsis_only_when_needed() {
        assert_eq!(truncate_with_ellipsis("short", 200), "short");
        let long = "x".repeat(250);
        let truncated = truncate_with_ellipsis(&long, 200);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn context_assembly_uses_fixed_delimiter() {
        let a = Fragment::new("alpha body")
            .with_meta(meta_keys::SOURCE, "/a.java")
            .with_meta(meta_keys::FILENAME, "a.java");
        let b = Fragment::new("beta body")
            .with_meta(meta_keys::SOURCE, "/b.java")
            .with_meta(meta_keys::FILENAME, "b.java");
        let context = assemble_context(&[a, b]);
        assert!(context.contains("alpha body"));
        assert!(context.contains("beta body"));
        assert!(context.contains(CONTEXT_DELIMITER));
    }

    #[test]
    fn flatten_metadata_keeps_only_structural_keys() {
        let fragment = Fragment::new("body")
            .with_meta(meta_keys::SOURCE, "/a/Foo.java")
            .with_meta(meta_keys::FILENAME, "Foo.java")
            .with_meta(meta_keys::HYBRID_SCORE, "0.9")
            .with_meta(meta_keys::SEMANTIC_SCORE, "0.8")
            .with_meta(meta_keys::KEYWORD_SCORE, "0.7")
            .with_meta(meta_keys::CLASS_NAME, "Foo")
            .with_meta(meta_keys::METHOD_NAME, "bar")
            .with_meta(meta_keys::START_LINE, "10")
            .with_meta(meta_keys::END_LINE, "20")
            .with_meta(meta_keys::CHUNK_TYPE, "method");

        let flattened = flatten_metadata(&fragment);

        assert!(flattened.contains("class_name=Foo"));
        assert!(flattened.contains("method_name=bar"));
        assert!(flattened.contains("start_line=10"));
        assert!(flattened.contains("end_line=20"));
        assert!(flattened.contains("chunk_type=method"));
        assert!(!flattened.contains("source="));
        assert!(!flattened.contains("filename="));
        assert!(!flattened.contains("hybrid_score="));
        assert!(!flattened.contains("semantic_score="));
        assert!(!flattened.contains("keyword_score="));
    }

    #[test]
    fn flatten_metadata_omits_missing_structural_keys() {
        let fragment = Fragment::new("body").with_meta(meta_keys::CLASS_NAME, "Foo");
        assert_eq!(flatten_metadata(&fragment), "class_name=Foo");
    }
}
