//! C2 — Ingestor (§4.2). Walks a starting path, dispatches each supported
//! file to a loader then the Chunker, batches the resulting Fragments, and
//! commits them to the vector store (embedding happens here) and the
//! lexical index. One file's failure never aborts the run; a fully
//! unreadable walk root is the one error surfaced to the caller (§7).

use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;

use crate::chunking::{self, Document};
use crate::config::RagConfig;
use crate::embeddings::EmbeddingModel;
use crate::error::RagError;
use crate::search::TextSearch;
use crate::storage::{LanceStore, StoredFragment};
use crate::types::{meta_keys, Fragment};

pub struct Ingestor {
    store: Arc<LanceStore>,
    lexical_index: Arc<TextSearch>,
    embeddings: Arc<dyn EmbeddingModel>,
    config: RagConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<LanceStore>,
        lexical_index: Arc<TextSearch>,
        embeddings: Arc<dyn EmbeddingModel>,
        config: RagConfig,
    ) -> Self {
        Self { store, lexical_index, embeddings, config }
    }

    /// Walk `root`, ingest every supported file found, and return the total
    /// number of fragments stored. A root that cannot be read at all is a
    /// traversal failure (§7); a single bad file within the walk is logged
    /// and skipped (§4.2, §7).
    pub async fn ingest_path(&self, root: &Path) -> Result<usize, RagError> {
        if !root.exists() {
            return Err(RagError::TraversalFailure(format!(
                "ingest path does not exist: {}",
                root.display()
            )));
        }

        let mut total = 0usize;
        let mut batch: Vec<StoredFragment> = Vec::new();
        let mut lexical_batch: Vec<(String, String, String, String)> = Vec::new();

        let walker = WalkDir::new(root)
            .max_depth(self.config.ingest.max_walk_depth)
            .into_iter();

        let mut any_entry = false;
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(error = %err, "ingestor: walk entry failed, skipping");
                    continue;
                }
            };
            any_entry = true;

            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let ext_lower = ext.to_lowercase();
            if !self
                .config
                .ingest
                .supported_extensions
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(&ext_lower))
            {
                continue;
            }

            match self.load_and_chunk(path, &ext_lower) {
                Ok(fragments) => {
                    for fragment in fragments {
                        let id = stable_id(&fragment);
                        let embedding = match self.embeddings.embed_document(&fragment.content) {
                            Ok(v) => v,
                            Err(err) => {
                                tracing::warn!(error = %err, path = %path.display(), "ingestor: embedding failed, skipping fragment");
                                continue;
                            }
                        };
                        let mut fragment = fragment;
                        fragment.embedding = embedding;

                        lexical_batch.push((
                            id.clone(),
                            fragment.content.clone(),
                            fragment.class_name().unwrap_or_default().to_string(),
                            fragment.source().to_string(),
                        ));
                        batch.push(StoredFragment { id, fragment });
                        total += 1;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, path = %path.display(), "ingestor: file load failed, skipping");
                    continue;
                }
            }
        }

        if !any_entry {
            return Err(RagError::TraversalFailure(format!(
                "ingest path yielded no readable entries: {}",
                root.display()
            )));
        }

        if !batch.is_empty() {
            self.store
                .upsert(&batch)
                .await
                .map_err(RagError::Internal)?;
        }
        if !lexical_batch.is_empty() {
            self.lexical_index
                .index_chunks_batch(&lexical_batch)
                .map_err(RagError::Internal)?;
            self.lexical_index.commit().map_err(RagError::Internal)?;
        }
        self.store.create_index_if_needed().await.ok();

        Ok(total)
    }

    /// Load a single file's raw content and dispatch to the Chunker. A
    /// completely empty file yields an empty fragment list (§4.1).
    fn load_and_chunk(&self, path: &Path, file_type: &str) -> anyhow::Result<Vec<Fragment>> {
        let source = path.to_string_lossy().to_string();
        let content = if file_type == "pdf" {
            load_pdf_text(path)?
        } else {
            std::fs::read_to_string(path)?
        };

        let document = Document::new(content, source, file_type);
        Ok(chunking::chunk(&document, &self.config.chunking))
    }
}

/// pdf_extract separates pages with form-feed characters; the PDF Chunker
/// (§4.1) expects exactly that so it can emit one fragment per page.
fn load_pdf_text(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| anyhow::anyhow!("pdf extraction failed: {}", e))
}

/// Stable id used both as the vector store's primary key and the lexical
/// index's document id: `source || content_hash`, which matches the
/// dedup/re-ingestion-stability identity defined on `Fragment` (§3, §8).
fn stable_id(fragment: &Fragment) -> String {
    let chunk_index = fragment.metadata.get(meta_keys::CHUNK_INDEX).cloned().unwrap_or_default();
    format!("{}::{}", fragment.identity(), chunk_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_incorporates_chunk_index() {
        let mut a = Fragment::new("same content").with_meta(meta_keys::SOURCE, "/a.java");
        a.metadata.insert(meta_keys::CHUNK_INDEX.to_string(), "0".to_string());
        let mut b = a.clone();
        b.metadata.insert(meta_keys::CHUNK_INDEX.to_string(), "1".to_string());
        assert_ne!(stable_id(&a), stable_id(&b));
    }
}
