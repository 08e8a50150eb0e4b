//! Core logic for markdeck: bookmark list <-> flashcard deck reconciliation.
//! This crate owns every sync invariant; the CLI only wires stores together.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod snapshot;
pub mod sync;

pub use config::{ConfigError, ReaddPolicy, SyncConfig};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::intent::MutationIntent;
pub use model::item::{Item, ItemId, ItemStatus};
pub use model::note::{Card, CardId, CardQueue, CardType, NewNote, Note, NoteId};
pub use model::tags::{TagSet, FAVORITE_MARKER, SUSPENDED_MARKER};
pub use repo::{RepoError, RepoResult, SqliteDeckStore};
pub use snapshot::{Snapshot, SnapshotError, SnapshotRemoteStore};
pub use sync::{
    CancelToken, LocalStore, ReconciliationEngine, RemoteStore, StoreError, SyncError, SyncReport,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
