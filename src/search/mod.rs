pub mod fuser;
pub mod lexical;
pub mod semantic;
pub mod text_search;

pub use fuser::HybridFuser;
pub use lexical::LexicalSearch;
pub use semantic::SemanticSearch;
pub use text_search::TextSearch;

use async_trait::async_trait;

use crate::types::Fragment;

/// C3 — Lexical Searcher. Backend failures are converted to an empty result
/// at this boundary (§9): implementations must never propagate an error to
/// the Fuser.
#[async_trait]
pub trait LexicalSearcher: Send + Sync {
    async fn search(&self, query_text: &str, top_k: usize) -> Vec<(Fragment, f32)>;
}

/// C4 — Semantic Searcher. Same empty-on-error contract as `LexicalSearcher`.
#[async_trait]
pub trait SemanticSearcher: Send + Sync {
    async fn search(&self, query_text: &str, top_k: usize, similarity_threshold: f32) -> Vec<Fragment>;
}
