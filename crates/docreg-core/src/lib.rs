//! Core types and state machine for the document registry.
//!
//! A registry binds an opaque record identifier to an off-system content
//! locator and an integrity hash, with per-record ownership, an
//! active/inactive lifecycle, and an administrator-controlled pause switch.
//!
//! This crate is deliberately free of I/O. Caller identity and the current
//! time are explicit inputs; durable storage lives in backend crates that
//! implement [`registry::DocumentRegistry`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod document;
pub mod error;
pub mod event;
pub mod identity;
pub mod registry;
pub mod service;
pub mod state;

pub use error::{Error, Result};
