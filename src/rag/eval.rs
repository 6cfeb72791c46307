//! C8 — Evaluator (§4.8). Runs a query through the Orchestrator, then
//! issues two separate judge calls against the generator model: relevance
//! (does the answer address the query?) and faithfulness (is the answer
//! supported by the retrieved context?).

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::llm::{GenerationConfig, Generator};
use crate::rag_engine::RagEngine;
use crate::types::Query;

const RELEVANCE_SYSTEM_PROMPT: &str =
    "You are an evaluation judge. Rate how directly the ANSWER addresses the QUESTION on a \
     scale of 1 to 5, where 5 is a complete, direct answer and 1 is entirely off-topic. \
     Respond with a single digit and nothing else.";

const FAITHFULNESS_SYSTEM_PROMPT: &str =
    "You are an evaluation judge. Rate how well the ANSWER is supported by the CONTEXT on a \
     scale of 1 to 5, where 5 means every claim in the answer is grounded in the context and \
     1 means the answer is unsupported or contradicts it. Respond with a single digit and \
     nothing else.";

const CONTEXT_TRUNCATION_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalScores {
    pub relevance: u8,
    pub faithfulness: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReasoning {
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub query: String,
    pub answer: String,
    pub scores: EvalScores,
    pub reasoning: EvalReasoning,
    pub latency_ms: u128,
}

pub struct Evaluator {
    engine: Arc<RagEngine>,
    judge: Arc<dyn Generator>,
}

impl Evaluator {
    pub fn new(engine: Arc<RagEngine>, judge: Arc<dyn Generator>) -> Self {
        Self { engine, judge }
    }

    /// §4.8: run the Orchestrator, then score the resulting answer against
    /// the query (relevance) and against the retrieved context
    /// (faithfulness). A judge-parsing failure scores 0 for that dimension
    /// rather than failing the evaluation (§7).
    pub async fn evaluate(&self, request: &EvalRequest) -> EvalMetrics {
        let started = Instant::now();

        let query = Query::new(request.query.clone());
        let (response, context) = self.engine.chat_with_context(&query).await;

        let relevance_prompt = format!("QUESTION: {}\n\nANSWER: {}", request.query, response.answer);
        let relevance_raw = self
            .judge
            .generate(RELEVANCE_SYSTEM_PROMPT, &relevance_prompt, &judge_config())
            .await
            .unwrap_or_default();
        let relevance = parse_first_digit(&relevance_raw);

        let faithfulness = if context.trim().is_empty() {
            0
        } else {
            let truncated_context: String = context.chars().take(CONTEXT_TRUNCATION_CHARS).collect();
            let faithfulness_prompt =
                format!("CONTEXT: {}\n\nANSWER: {}", truncated_context, response.answer);
            let raw = self
                .judge
                .generate(FAITHFULNESS_SYSTEM_PROMPT, &faithfulness_prompt, &judge_config())
                .await
                .unwrap_or_default();
            parse_first_digit(&raw)
        };

        EvalMetrics {
            query: request.query.clone(),
            answer: response.answer,
            scores: EvalScores { relevance, faithfulness },
            reasoning: EvalReasoning {
                summary: format!(
                    "relevance judged against question; faithfulness judged against {} chars of context",
                    context.len().min(CONTEXT_TRUNCATION_CHARS)
                ),
            },
            latency_ms: started.elapsed().as_millis(),
        }
    }
}

fn judge_config() -> GenerationConfig {
    GenerationConfig {
        max_tokens: 8,
        temperature: 0.0,
        top_p: 1.0,
    }
}

/// Extract the first digit (0-9) from the judge's response; if none is
/// present, score 0 (§4.8 "Parsing").
fn parse_first_digit(text: &str) -> u8 {
    text.chars()
        .find(|c| c.is_ascii_digit())
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_digit() {
        assert_eq!(parse_first_digit("5"), 5);
        assert_eq!(parse_first_digit("  4 out of 5"), 4);
    }

    #[test]
    fn unparseable_response_scores_zero() {
        assert_eq!(parse_first_digit("I cannot rate this."), 0);
        assert_eq!(parse_first_digit(""), 0);
    }
}
