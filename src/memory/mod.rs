//! Memory module for EchoNote
//!
//! Provides the fact data model, the reconciliation algorithm that merges
//! incremental extractions, and the store that owns the fact set and the
//! transcript cursor.

mod facts;
mod reconcile;
mod store;

pub use facts::{
    Appointment, Deadline, FactBundle, FactKind, FactSet, FactUpdate, IncrementalUpdate,
    Location, Priority, Task,
};
pub use reconcile::{apply_update, MergeReport};
pub use store::{MemoryStore, ProcessOutcome};
