//! Generator — the narrow interface onto the external collaborator the
//! spec calls "the generator model" (§1: out of scope; §9: re-expressed as
//! a plain capability interface rather than the teacher's full local/
//! external provider hierarchy). The Orchestrator (§4.7) and Evaluator
//! (§4.8) only ever need one capability: turn a system instruction plus a
//! user prompt into text, within a timeout.

pub mod external;

pub use external::{ApiProvider, HttpGenerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters passed through to the generator on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.3,
            top_p: 0.95,
        }
    }
}

/// C7/C8's only dependency on the generator model. A timeout or transport
/// error is the caller's concern to interpret (§5, §7): the Orchestrator
/// degrades to a canonical error answer, the Evaluator scores 0.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        config: &GenerationConfig,
    ) -> anyhow::Result<String>;

    /// A short label surfaced in `response_metadata.model_label` (§3).
    fn label(&self) -> String;
}
