//! Offline-first data access for the textile ERP API.
//!
//! [`DataManager`] is the entry point: it serves reads from a persistent
//! response cache, sends mutations through a retrying transport, queues them
//! while offline and replays the queue when connectivity returns.

pub mod cache;
pub mod commands;
pub mod config;
pub mod erp;
pub mod error;
pub mod manager;
pub mod sync;
pub mod transport;

pub use cache::{CacheResult, CacheSource, KvStore, MemoryStore, SqliteStore};
pub use config::Config;
pub use error::DataError;
pub use manager::{DataManager, MutationOutcome, Status, Subscription};
pub use sync::{ConnectivityEvent, ConnectivityHandler, DrainReport, PendingOperation};
pub use transport::{HttpTransport, RetryPolicy, Transport, TransportError};
