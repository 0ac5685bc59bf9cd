//! # planquery
//!
//! **A retrieval-augmented query engine for government planning
//! application records.**
//!
//! planquery ingests a cleaned feed of planning applications, classifies
//! each record (development category, land type, scale), synthesizes
//! natural-language chunks, embeds them, and serves role-aware semantic
//! search and grounded question answering over the result.
//!
//! ## Data Flow
//!
//! 1. `plq build` reads a JSON feed export, classifies every record with
//!    the versioned keyword ruleset, and synthesizes chunks
//!    ([`planquery_core::document`]).
//! 2. Chunk texts are batch-embedded by the configured provider
//!    ([`embedder`]) and written to SQLite in one atomic swap
//!    ([`sqlite_store`]).
//! 3. `plq search` embeds the question, oversamples nearest neighbours,
//!    applies stakeholder-role boosts, and prints the ranked chunks
//!    ([`engine`]).
//! 4. `plq ask` feeds the retrieved chunks to the generation provider
//!    ([`generation`]) and prints a grounded, citing answer.
//!
//! The pure domain logic — classifier, document builder, retrieval
//! algorithm, answer assembly — lives in the `planquery-core` crate;
//! this crate adds config, SQLite, HTTP providers, and the `plq` CLI.

pub mod build;
pub mod config;
pub mod db;
pub mod embedder;
pub mod engine;
pub mod generation;
pub mod migrate;
pub mod sqlite_store;
pub mod stats;
