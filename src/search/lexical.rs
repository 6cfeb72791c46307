//! C3 — Lexical Searcher (§4.3). BM25-like ranking against the persisted
//! tokenized content; raw scores are returned unnormalized (the Fuser
//! normalizes them, §4.5 Step 3).

use async_trait::async_trait;
use std::sync::Arc;

use crate::search::{LexicalSearcher, TextSearch};
use crate::storage::LanceStore;
use crate::types::Fragment;

pub struct LexicalSearch {
    index: Arc<TextSearch>,
    store: Arc<LanceStore>,
}

impl LexicalSearch {
    pub fn new(index: Arc<TextSearch>, store: Arc<LanceStore>) -> Self {
        Self { index, store }
    }
}

#[async_trait]
impl LexicalSearcher for LexicalSearch {
    /// On backend error, returns empty (§4.3, §7). Tantivy's query parser
    /// already only returns documents matching at least one query token.
    async fn search(&self, query_text: &str, top_k: usize) -> Vec<(Fragment, f32)> {
        let hits = match self.index.search(query_text, top_k) {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!(error = %err, "lexical searcher: tantivy query failed, returning empty");
                return Vec::new();
            }
        };
        if hits.is_empty() {
            return Vec::new();
        }

        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        let stored = match self.store.get_by_ids(&ids).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "lexical searcher: fragment lookup failed, returning empty");
                return Vec::new();
            }
        };

        let by_id: std::collections::HashMap<String, Fragment> = stored
            .into_iter()
            .map(|row| (row.id, row.fragment))
            .collect();

        hits.into_iter()
            .filter_map(|(id, score)| by_id.get(&id).cloned().map(|fragment| (fragment, score)))
            .collect()
    }
}
