//! Response caching and durable client storage.
//!
//! This module provides:
//! - A response cache keyed by `"<METHOD>:<endpoint>"`, written through to
//!   durable storage on every change and hydrated from it at startup
//! - Loose endpoint invalidation, so a mutation clears related collection and
//!   item entries
//! - The durable key/value storage itself (SQLite or in-memory) and the auth
//!   token kept next to the cache snapshot

mod layer;
mod source;
mod storage;

pub use layer::{cache_key, Cache, CACHE_SNAPSHOT_KEY};
pub use source::{CacheResult, CacheSource};
pub use storage::{
  clear_auth_token, load_auth_token, save_auth_token, KvStore, MemoryStore, SqliteStore,
  AUTH_TOKEN_KEY,
};
