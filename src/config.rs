use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level, read-only-after-startup configuration snapshot. Passed by
/// reference into constructors; nothing here mutates for the process
/// lifetime (§5 "Shared resources").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub data_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub hybrid: HybridConfig,
    pub ingest: IngestConfig,
    pub generator: GeneratorConfig,
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_dir: PathBuf,
    /// `vector.dimensions` (default 768 or 1536, must match the embedding model).
    pub dimension: usize,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// `chunk.java.max_tokens` (default 1500).
    pub java_max_tokens: usize,
    /// `chunk.markdown.max_tokens` (default 1000).
    pub markdown_max_tokens: usize,
    /// Token budget for the generic fixed-window splitter.
    pub generic_max_tokens: usize,
    pub generic_overlap_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// `hybrid.alpha` (default 0.7, [0,1]) — semantic weight in the convex combination.
    pub alpha: f32,
    /// `hybrid.retrieval_multiplier` (default 2, ≥1) — over-retrieval factor.
    pub retrieval_multiplier: usize,
    pub default_top_k: usize,
    pub default_similarity_threshold: f32,
    /// Per-backend call timeout; a timeout degrades to an empty result (§5).
    pub backend_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub supported_extensions: Vec<String>,
    pub max_walk_depth: usize,
}

/// Generator model access (§1: external collaborator, invoked through the
/// narrow `Generator` trait only). The API key is read from an environment
/// variable named here, never stored in the config snapshot itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    /// The generator call's own timeout (§5); on timeout the Orchestrator
    /// returns the canonical error answer rather than treating it as an
    /// empty-result backend.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub enable_pii_redaction: bool,
    pub enable_evaluation: bool,
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".into());
        }
        if self.chunking.java_max_tokens < 50 {
            return Err("chunk.java.max_tokens must be >= 50".into());
        }
        if self.chunking.markdown_max_tokens < 50 {
            return Err("chunk.markdown.max_tokens must be >= 50".into());
        }
        if !(0.0..=1.0).contains(&self.hybrid.alpha) {
            return Err("hybrid.alpha must be in [0.0, 1.0]".into());
        }
        if self.hybrid.retrieval_multiplier < 1 {
            return Err("hybrid.retrieval_multiplier must be >= 1".into());
        }
        if !(0.0..=1.0).contains(&self.hybrid.default_similarity_threshold) {
            return Err("hybrid.default_similarity_threshold must be in [0.0, 1.0]".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rag-core");

        let model_dir = if Path::new("models").exists() {
            PathBuf::from("models")
        } else if let Ok(env_path) = std::env::var("MODEL_PATH") {
            PathBuf::from(env_path)
        } else {
            data_dir.join("models")
        };

        Self {
            data_dir,
            embedding: EmbeddingConfig {
                model_dir,
                dimension: 768,
                cache_size: 1000,
            },
            chunking: ChunkingConfig {
                java_max_tokens: 1500,
                markdown_max_tokens: 1000,
                generic_max_tokens: 1000,
                generic_overlap_tokens: 100,
            },
            hybrid: HybridConfig {
                alpha: 0.7,
                retrieval_multiplier: 2,
                default_top_k: 5,
                default_similarity_threshold: 0.7,
                backend_timeout_ms: 5_000,
            },
            ingest: IngestConfig {
                supported_extensions: vec![
                    "java".into(),
                    "md".into(),
                    "txt".into(),
                    "pdf".into(),
                    "yaml".into(),
                    "yml".into(),
                    "gradle".into(),
                    "properties".into(),
                ],
                max_walk_depth: 32,
            },
            generator: GeneratorConfig {
                provider: "openai".into(),
                model: "gpt-4o-mini".into(),
                api_key_env: "RAG_GENERATOR_API_KEY".into(),
                timeout_ms: 30_000,
            },
            features: FeatureFlags {
                enable_pii_redaction: true,
                enable_evaluation: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn alpha_out_of_range_is_rejected() {
        let mut cfg = RagConfig::default();
        cfg.hybrid.alpha = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn retrieval_multiplier_below_one_is_rejected() {
        let mut cfg = RagConfig::default();
        cfg.hybrid.retrieval_multiplier = 0;
        assert!(cfg.validate().is_err());
    }
}
