//! Bookmark list <-> flashcard deck reconciliation.
//!
//! # Responsibility
//! - Pure resolvers (`tags`, `favorite`, `lifecycle`, `schedule`) deciding
//!   what each side should hold.
//! - Orchestration (`engine`, `bridge`) collecting intents into a `BatchPlan`.
//! - Batched application (`apply`) against the `store` traits.

pub mod apply;
pub mod bridge;
pub mod cancel;
pub mod clock;
pub mod engine;
pub mod favorite;
pub mod lifecycle;
pub mod plan;
pub mod schedule;
pub mod store;
pub mod tags;

pub use apply::{ApplyReport, MutationApplier};
pub use bridge::{AdoptedNote, ItemRequest, NoteCreationBridge};
pub use cancel::CancelToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{ReconciliationEngine, SyncError, SyncReport};
pub use plan::BatchPlan;
pub use store::{ActionOutcome, LocalStore, NoteQuery, RemoteStore, StoreError, StoreResult};
