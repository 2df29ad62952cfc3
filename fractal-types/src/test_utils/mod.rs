//! Test doubles for the provider and embedder contracts.
//!
//! Enabled with the `test-utils` feature. [`MockProvider`] replays a
//! script of turns in order; [`MockEmbedder`] produces deterministic
//! vectors from a content hash so idempotence properties hold.

mod mock_embedder;
mod mock_provider;

pub use mock_embedder::MockEmbedder;
pub use mock_provider::{MockProvider, MockTurn};
