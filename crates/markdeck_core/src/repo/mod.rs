//! Persistence implementations of the store contracts.
//!
//! # Responsibility
//! - Keep SQLite query details out of the sync engine.
//!
//! # Invariants
//! - Repository writes enforce deck invariants (immutable `item_id`, no
//!   duplicate links) before persistence.
//! - Repository errors map onto `StoreError` so the engine can classify them.

pub mod deck_repo;

pub use deck_repo::{RepoError, RepoResult, SqliteDeckStore};
