//! Offline support: the pending-operation queue and connectivity signals.
//!
//! Mutations that cannot reach the server are kept in a [`SyncQueue`] and
//! replayed, oldest first, when a [`ConnectivityEvent::Online`] arrives.
//! The queue lives in memory only.

mod connectivity;
mod queue;

pub use connectivity::{ConnectivityEvent, ConnectivityHandler};
pub use queue::{DrainReport, OperationKind, PendingOperation, SyncQueue};
