//! Retrieval core for answering natural-language questions about a software
//! repository: code-aware chunking, hybrid dense/lexical search, PII
//! redaction, grounded generation, and LLM-as-judge evaluation.

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod pii;
pub mod rag;
pub mod rag_engine;
pub mod search;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::RagError;
pub use rag_engine::RagEngine;
pub use types::{Filter, Fragment, Query, Response, SourceDocument};

pub use anyhow::{Error, Result};
