//! C5 — Hybrid Fuser (§4.5), the algorithmic heart of the retrieval core.
//!
//! Over-retrieves from both backends, filters each list independently,
//! normalizes semantic results by rank and lexical results by max-score,
//! then convex-combines the two into a single ranked list.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::HybridConfig;
use crate::search::{LexicalSearcher, SemanticSearcher};
use crate::types::{meta_keys, Filter, Fragment};

pub struct HybridFuser {
    semantic: Box<dyn SemanticSearcher>,
    lexical: Box<dyn LexicalSearcher>,
    config: HybridConfig,
}

impl HybridFuser {
    pub fn new(
        semantic: Box<dyn SemanticSearcher>,
        lexical: Box<dyn LexicalSearcher>,
        config: HybridConfig,
    ) -> Self {
        Self { semantic, lexical, config }
    }

    /// Run the full fusion pipeline (§4.5 Steps 1-6). `top_k = 0` yields
    /// empty without ever calling a backend.
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        similarity_threshold: f32,
        filter: Option<&Filter>,
    ) -> Vec<Fragment> {
        if top_k == 0 {
            return Vec::new();
        }

        let over_retrieve_k = top_k.saturating_mul(self.config.retrieval_multiplier.max(1));
        let backend_timeout = Duration::from_millis(self.config.backend_timeout_ms);

        // Step 1 — over-retrieval. Independent, non-dependent backend calls
        // run concurrently (§5); a per-call timeout degrades to empty (§5,
        // §7) rather than failing the whole request.
        let (semantic_raw, lexical_raw) = tokio::join!(
            run_with_timeout(
                backend_timeout,
                self.semantic.search(query_text, over_retrieve_k, similarity_threshold),
            ),
            run_with_timeout(
                backend_timeout,
                self.lexical.search(query_text, over_retrieve_k),
            ),
        );

        // Step 2 — filter each list independently, before normalization.
        let semantic_filtered: Vec<Fragment> = apply_filter(semantic_raw, filter);
        let lexical_filtered: Vec<(Fragment, f32)> = lexical_raw
            .into_iter()
            .filter(|(fragment, _)| filter.map_or(true, |f| f.matches(fragment)))
            .collect();

        if semantic_filtered.is_empty() && lexical_filtered.is_empty() {
            return Vec::new();
        }

        // Step 3 — normalization.
        let semantic_norm = rank_normalize(&semantic_filtered);
        let lexical_norm = max_normalize(&lexical_filtered);

        // Step 4/5 — identity + convex combination.
        let alpha = self.config.alpha.clamp(0.0, 1.0);
        let mut combined: HashMap<String, CombinedEntry> = HashMap::new();

        for (fragment, sem_score) in semantic_filtered.into_iter().zip(semantic_norm.into_iter()) {
            let identity = fragment.identity();
            combined
                .entry(identity)
                .or_insert_with(|| CombinedEntry::new(fragment))
                .semantic_score = Some(sem_score);
        }

        for ((fragment, _raw), kw_score) in lexical_filtered.into_iter().zip(lexical_norm.into_iter()) {
            let identity = fragment.identity();
            combined
                .entry(identity)
                .or_insert_with(|| CombinedEntry::new(fragment))
                .keyword_score = Some(kw_score);
        }

        let mut results: Vec<Fragment> = combined
            .into_values()
            .map(|entry| entry.finalize(alpha))
            .collect();

        // Step 6 — rank & limit: sort by combined score descending (stable),
        // ties broken by lexical score then source string ascending.
        results.sort_by(|a, b| {
            b.hybrid_score()
                .partial_cmp(&a.hybrid_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.keyword_score_value()
                        .partial_cmp(&a.keyword_score_value())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.source().cmp(b.source()))
        });
        results.truncate(top_k);
        results
    }
}

async fn run_with_timeout<T, F>(duration: Duration, fut: F) -> Vec<T>
where
    F: std::future::Future<Output = Vec<T>>,
{
    timeout(duration, fut).await.unwrap_or_default()
}

fn apply_filter(fragments: Vec<Fragment>, filter: Option<&Filter>) -> Vec<Fragment> {
    match filter {
        None => fragments,
        Some(f) => fragments.into_iter().filter(|fragment| f.matches(fragment)).collect(),
    }
}

/// Rank-based normalization for the semantic side (§4.5 Step 3): the item
/// at 0-based rank `r` of a list of length `L` (clamped to >= 1) receives
/// `1 - r / L`.
fn rank_normalize(fragments: &[Fragment]) -> Vec<f32> {
    let l = fragments.len().max(1) as f32;
    (0..fragments.len())
        .map(|r| 1.0 - (r as f32) / l)
        .collect()
}

/// Max-based normalization for the lexical side (§4.5 Step 3):
/// `norm_kw(s) = s / M` where `M = max(raw_score)`, default 1 if empty.
fn max_normalize(results: &[(Fragment, f32)]) -> Vec<f32> {
    let max = results
        .iter()
        .map(|(_, score)| *score)
        .fold(f32::MIN, f32::max);
    let max = if results.is_empty() || max <= 0.0 { 1.0 } else { max };
    results.iter().map(|(_, score)| score / max).collect()
}

/// Accumulator for a single fragment's per-backend normalized scores before
/// the convex combination is applied (§4.5 Step 5).
struct CombinedEntry {
    fragment: Fragment,
    semantic_score: Option<f32>,
    keyword_score: Option<f32>,
}

impl CombinedEntry {
    fn new(fragment: Fragment) -> Self {
        Self {
            fragment,
            semantic_score: None,
            keyword_score: None,
        }
    }

    fn finalize(mut self, alpha: f32) -> Fragment {
        let sem = self.semantic_score.unwrap_or(0.0);
        let kw = self.keyword_score.unwrap_or(0.0);
        let hybrid = match (self.semantic_score, self.keyword_score) {
            (Some(_), Some(_)) => alpha * sem + (1.0 - alpha) * kw,
            (Some(_), None) => alpha * sem,
            (None, Some(_)) => (1.0 - alpha) * kw,
            (None, None) => 0.0,
        };
        self.fragment.set_score(meta_keys::SEMANTIC_SCORE, sem);
        self.fragment.set_score(meta_keys::KEYWORD_SCORE, kw);
        self.fragment.set_score(meta_keys::HYBRID_SCORE, hybrid);
        self.fragment
    }
}

trait FragmentScoreExt {
    fn keyword_score_value(&self) -> f32;
}

impl FragmentScoreExt for Fragment {
    fn keyword_score_value(&self) -> f32 {
        self.metadata
            .get(meta_keys::KEYWORD_SCORE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn frag(source: &str, content: &str) -> Fragment {
        Fragment::new(content).with_meta(meta_keys::SOURCE, source)
    }

    struct FixedSemantic(Vec<Fragment>);
    #[async_trait]
    impl SemanticSearcher for FixedSemantic {
        async fn search(&self, _q: &str, _top_k: usize, _threshold: f32) -> Vec<Fragment> {
            self.0.clone()
        }
    }

    struct FixedLexical(Vec<(Fragment, f32)>);
    #[async_trait]
    impl LexicalSearcher for FixedLexical {
        async fn search(&self, _q: &str, _top_k: usize) -> Vec<(Fragment, f32)> {
            self.0.clone()
        }
    }

    struct ThrowingSemantic;
    #[async_trait]
    impl SemanticSearcher for ThrowingSemantic {
        async fn search(&self, _q: &str, _top_k: usize, _threshold: f32) -> Vec<Fragment> {
            Vec::new()
        }
    }

    fn default_config() -> HybridConfig {
        HybridConfig {
            alpha: 0.7,
            retrieval_multiplier: 2,
            default_top_k: 5,
            default_similarity_threshold: 0.7,
            backend_timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn scenario_one_doc_wins_both_backends() {
        let a = frag("A", "alpha");
        let b = frag("B", "bravo");
        let c = frag("C", "charlie");
        let d = frag("D", "delta");

        let semantic = FixedSemantic(vec![a.clone(), b.clone(), c.clone()]);
        let lexical = FixedLexical(vec![(a.clone(), 18.5), (c.clone(), 12.0), (d.clone(), 8.0)]);

        let fuser = HybridFuser::new(Box::new(semantic), Box::new(lexical), default_config());
        let results = fuser.search("q", 3, 0.0, None).await;

        let sources: Vec<&str> = results.iter().map(|f| f.source()).collect();
        assert_eq!(sources, vec!["A", "B", "C"]);
        assert!((results[0].hybrid_score() - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn backend_outage_degrades_to_other_backend_only() {
        let x = frag("X", "xray");
        let lexical = FixedLexical(vec![(x.clone(), 5.0)]);
        let fuser = HybridFuser::new(Box::new(ThrowingSemantic), Box::new(lexical), default_config());

        let results = fuser.search("q", 5, 0.0, None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source(), "X");
        assert!((results[0].hybrid_score() - 0.3).abs() < 1e-4);
    }

    #[tokio::test]
    async fn top_k_zero_yields_empty_without_calling_backends() {
        let fuser = HybridFuser::new(
            Box::new(FixedSemantic(vec![frag("A", "a")])),
            Box::new(FixedLexical(vec![])),
            default_config(),
        );
        assert!(fuser.search("q", 0, 0.0, None).await.is_empty());
    }

    #[tokio::test]
    async fn filter_narrows_to_nothing() {
        let md_doc = frag("doc.md", "content").with_meta(meta_keys::FILE_TYPE, "md");
        let fuser = HybridFuser::new(
            Box::new(FixedSemantic(vec![md_doc.clone()])),
            Box::new(FixedLexical(vec![(md_doc, 1.0)])),
            default_config(),
        );
        let filter = Filter { file_type: Some("java".into()), ..Default::default() };
        let results = fuser.search("q", 5, 0.0, Some(&filter)).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn alpha_one_reduces_to_pure_semantic() {
        let a = frag("A", "alpha");
        let b = frag("B", "bravo");
        let mut cfg = default_config();
        cfg.alpha = 1.0;
        let fuser = HybridFuser::new(
            Box::new(FixedSemantic(vec![a.clone(), b.clone()])),
            Box::new(FixedLexical(vec![(b.clone(), 99.0)])),
            cfg,
        );
        let results = fuser.search("q", 5, 0.0, None).await;
        assert_eq!(results[0].source(), "A");
        for f in &results {
            assert_eq!(f.keyword_score_value() * 0.0, 0.0); // keyword present but zero-weighted
        }
    }
}
