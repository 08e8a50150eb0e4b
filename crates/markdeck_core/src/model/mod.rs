//! Domain model shared by the reconciliation engine and both stores.
//!
//! # Responsibility
//! - Define bookmark items, flashcard notes/cards and outbound mutation intents.
//! - Normalize wire quirks (string flags, map-or-list collections) at the
//!   deserialization boundary so sync logic only sees typed values.
//!
//! # Invariants
//! - A note is linked to at most one item through its `item_id` field.
//! - Control marker tags never appear in domain tag sets.

pub mod intent;
pub mod item;
pub mod note;
pub mod tags;
