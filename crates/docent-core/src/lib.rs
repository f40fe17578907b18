//! # Docent Core
//!
//! I/O-free building blocks for Docent: document models, the overlapping
//! chunker, the embedding trait, the exact vector index, and the error
//! taxonomy shared by every pipeline stage.
//!
//! This crate contains no tokio, HTTP, or filesystem code. The `docent`
//! app crate supplies corpus loading, remote embedding providers, and the
//! conversation loop on top of it.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
