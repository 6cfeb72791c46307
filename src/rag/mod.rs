//! C8 — Evaluator (§4.8).

pub mod eval;

pub use eval::{EvalMetrics, EvalRequest, Evaluator};
