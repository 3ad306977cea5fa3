//! Reconciliation of "capture finished" records.
//!
//! Entry points write [`PendingResult`]s into a shared [`PendingStore`]
//! without coordinating. The results side reads whatever is there, picks one
//! authoritative record and finishes any compositing that was deferred.

pub mod pending;
pub mod reconciler;
pub mod store;

pub use pending::{
    PendingHeader, PendingPayload, PendingResult, SourceKind, authority_order, select_authoritative,
};
pub use reconciler::{Degradation, FinalImage, Reconciled, ResultReconciler};
pub use store::{FileStore, MemoryStore, PendingStore, prune_stale};
