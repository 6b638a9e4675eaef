//! # catalog-search — natural-language table discovery
//!
//! Turns table metadata from a data catalog into embedding vectors, caches
//! the resulting index on disk, and ranks tables against a question by
//! cosine similarity.
//!
//! ## Architecture
//!
//! - **[`catalog`]** — Table/column descriptors and metadata sources
//! - **[`embedder`]** — Embedding providers (ONNX sentence-transformer, feature hashing)
//! - **[`index`]** — Text composition, index building, on-disk cache
//! - **[`search`]** — Cosine ranking and the shareable search engine
//! - **[`pipeline`]** — Build-or-load policy
//! - **[`render`]** — Text/JSON result output
//! - **[`config`]** — Configuration loading and validation

pub mod catalog;
pub mod config;
pub mod embedder;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod render;
pub mod search;

pub use error::{Error, Result};
