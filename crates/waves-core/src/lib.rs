//! Core types and trait definitions for the Waves survey metadata registry.
//!
//! This crate is deliberately free of parsing, database, and HTTP
//! dependencies. Every other crate in the workspace depends on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod codes;
pub mod error;
pub mod harmonize;
pub mod metadata;
pub mod store;

pub use error::{Error, Result};
