//! C4 — Semantic Searcher (§4.4). Delegates to the vector store's ANN
//! facility; the HNSW graph itself is the external collaborator's concern
//! (§1), this adapter only embeds the query and applies the threshold.

use async_trait::async_trait;
use std::sync::Arc;

use crate::embeddings::EmbeddingModel;
use crate::search::SemanticSearcher;
use crate::storage::LanceStore;
use crate::types::Fragment;

pub struct SemanticSearch {
    store: Arc<LanceStore>,
    embeddings: Arc<dyn EmbeddingModel>,
}

impl SemanticSearch {
    pub fn new(store: Arc<LanceStore>, embeddings: Arc<dyn EmbeddingModel>) -> Self {
        Self { store, embeddings }
    }
}

#[async_trait]
impl SemanticSearcher for SemanticSearch {
    /// On any backend error (embedding failure or ANN query failure) this
    /// returns empty rather than propagating (§4.4, §7).
    async fn search(&self, query_text: &str, top_k: usize, similarity_threshold: f32) -> Vec<Fragment> {
        let embedding = match self.embeddings.embed_query(query_text) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(error = %err, "semantic searcher: embedding failed, returning empty");
                return Vec::new();
            }
        };

        let hits = match self.store.ann_search(&embedding, top_k).await {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!(error = %err, "semantic searcher: ANN query failed, returning empty");
                return Vec::new();
            }
        };

        // Already ordered by decreasing cosine similarity from the ANN
        // backend; we only need to apply the threshold.
        hits.into_iter()
            .filter(|(_, similarity)| *similarity >= similarity_threshold)
            .map(|(stored, _)| stored.fragment)
            .collect()
    }
}
