//! # Planquery Core
//!
//! Domain logic for Planquery: planning-record models, the keyword
//! classifier, the document builder, the vector-index abstraction, and
//! the retrieval + answer-generation pipeline.
//!
//! This crate contains no tokio runtime, sqlx, or filesystem I/O —
//! backends and providers are injected through the [`store::VectorIndex`],
//! [`embedding::Embedder`], and [`generate::CompletionProvider`] traits.
//! Concrete SQLite, OpenAI, Ollama, and Anthropic implementations live
//! in the `planquery` app crate.
//!
//! ## Pipeline
//!
//! ```text
//! build time:  RawRecord ─▶ classify ─▶ build_chunks ─▶ embed ─▶ VectorIndex
//! query time:  Query ─▶ retrieve (embed + search + role boost) ─▶ generate ─▶ Answer
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Core data types: `RawRecord`, `ClassifiedRecord`, `PlanningChunk`, `Answer` |
//! | [`classify`] | Versioned keyword ruleset with a fixed category priority order |
//! | [`document`] | Chunk synthesis: one primary chunk plus appeal/FI chunks |
//! | [`embedding`] | `Embedder` trait, vector blob codec, similarity helpers |
//! | [`store`] | `VectorIndex` trait, metadata filters, in-memory implementation |
//! | [`retrieve`] | Role-aware retrieval: oversample, soft boost, re-rank, dedupe |
//! | [`generate`] | Prompt assembly, empty-context guard, citation extraction |
//! | [`error`] | Typed failure taxonomy for index, embedding, and generation |

pub mod classify;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod models;
pub mod retrieve;
pub mod store;

pub use classify::{classify, DevelopmentCategory, LandType, Scale, RULESET_VERSION};
pub use document::build_chunks;
pub use error::{EmbedError, GenerationError, IndexError, RetrieveError};
pub use models::{
    Answer, ClassifiedRecord, PlanningChunk, Query, RawRecord, ScoredChunk, StakeholderRole,
};
