//! Write-through response cache keyed by `"<METHOD>:<endpoint>"`.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::storage::KvStore;
use crate::transport::Method;

/// Storage key holding the serialized cache snapshot.
pub const CACHE_SNAPSHOT_KEY: &str = "erp_data_cache";

/// Build the cache key for a request.
pub fn cache_key(method: Method, endpoint: &str) -> String {
  format!("{}:{}", method, endpoint)
}

/// Whether the entry under `key` is related to `endpoint`.
///
/// Matches in both directions: the key contains the endpoint (a collection
/// mutation reaches its filtered queries), or the endpoint contains the key's
/// endpoint part (an item mutation reaches its collection).
fn is_related(key: &str, endpoint: &str) -> bool {
  let key_endpoint = key.split_once(':').map(|(_, rest)| rest).unwrap_or(key);
  key.contains(endpoint) || endpoint.contains(key_endpoint)
}

/// In-memory response cache mirrored to durable storage on every write.
///
/// The full snapshot is stored as a JSON array of `[key, value]` pairs under
/// [`CACHE_SNAPSHOT_KEY`].
pub struct Cache<S: KvStore> {
  entries: Mutex<BTreeMap<String, Value>>,
  storage: Arc<S>,
}

impl<S: KvStore> Cache<S> {
  /// Create a cache, hydrating it from storage.
  ///
  /// A missing, unreadable or corrupt snapshot yields an empty cache.
  pub fn load(storage: Arc<S>) -> Self {
    let entries = hydrate(&*storage);
    Self {
      entries: Mutex::new(entries),
      storage,
    }
  }

  fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self, key: &str) -> Option<Value> {
    self.entries().get(key).cloned()
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries().contains_key(key)
  }

  /// Store a value and flush the snapshot.
  pub fn set(&self, key: impl Into<String>, value: Value) {
    let mut entries = self.entries();
    entries.insert(key.into(), value);
    self.flush(&entries);
  }

  /// Drop every entry related to `endpoint` and flush. Returns how many were removed.
  pub fn invalidate(&self, endpoint: &str) -> usize {
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|key, _| !is_related(key, endpoint));
    let removed = before - entries.len();

    if removed > 0 {
      debug!(endpoint, removed, "Invalidated cache entries");
    }
    self.flush(&entries);
    removed
  }

  /// Empty the cache and flush.
  pub fn clear(&self) {
    let mut entries = self.entries();
    entries.clear();
    self.flush(&entries);
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries().is_empty()
  }

  /// Keys currently cached, in sorted order.
  pub fn keys(&self) -> Vec<String> {
    self.entries().keys().cloned().collect()
  }

  fn flush(&self, entries: &BTreeMap<String, Value>) {
    let snapshot: Vec<(&String, &Value)> = entries.iter().collect();
    let encoded = match serde_json::to_string(&snapshot) {
      Ok(encoded) => encoded,
      Err(e) => {
        warn!(error = %e, "Failed to serialize cache snapshot");
        return;
      }
    };

    if let Err(e) = self.storage.set(CACHE_SNAPSHOT_KEY, &encoded) {
      warn!(error = %e, "Failed to save cache snapshot");
    }
  }
}

fn hydrate<S: KvStore + ?Sized>(storage: &S) -> BTreeMap<String, Value> {
  let raw = match storage.get(CACHE_SNAPSHOT_KEY) {
    Ok(Some(raw)) => raw,
    Ok(None) => return BTreeMap::new(),
    Err(e) => {
      warn!(error = %e, "Failed to load cache snapshot, starting empty");
      return BTreeMap::new();
    }
  };

  match serde_json::from_str::<Vec<(String, Value)>>(&raw) {
    Ok(pairs) => {
      debug!(entries = pairs.len(), "Restored cache snapshot");
      pairs.into_iter().collect()
    }
    Err(e) => {
      warn!(error = %e, "Cache snapshot is corrupt, starting empty");
      BTreeMap::new()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStore;
  use color_eyre::{eyre::eyre, Result};
  use serde_json::json;

  fn empty_cache() -> (Arc<MemoryStore>, Cache<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let cache = Cache::load(Arc::clone(&storage));
    (storage, cache)
  }

  /// Storage whose writes always fail.
  struct ReadOnlyStore;

  impl KvStore for ReadOnlyStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
      Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
      Err(eyre!("disk full"))
    }

    fn remove(&self, _key: &str) -> Result<()> {
      Err(eyre!("disk full"))
    }
  }

  #[test]
  fn test_cache_key_format() {
    assert_eq!(
      cache_key(Method::Get, "/inventory/materials?category=fabric"),
      "GET:/inventory/materials?category=fabric"
    );
  }

  #[test]
  fn test_set_is_written_through() {
    let (storage, cache) = empty_cache();

    cache.set("GET:/sales/orders", json!([{"id": "SO-1"}]));

    let raw = storage.get(CACHE_SNAPSHOT_KEY).unwrap().unwrap();
    let pairs: Vec<(String, Value)> = serde_json::from_str(&raw).unwrap();
    assert_eq!(
      pairs,
      vec![("GET:/sales/orders".to_string(), json!([{"id": "SO-1"}]))]
    );
  }

  #[test]
  fn test_set_overwrites() {
    let (_storage, cache) = empty_cache();

    cache.set("GET:/sales/orders", json!([]));
    cache.set("GET:/sales/orders", json!([{"id": "SO-2"}]));

    assert_eq!(cache.get("GET:/sales/orders"), Some(json!([{"id": "SO-2"}])));
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn test_hydrates_from_storage() {
    let storage = Arc::new(MemoryStore::new());
    storage
      .set(
        CACHE_SNAPSHOT_KEY,
        r#"[["GET:/inventory/materials",[{"id":"MAT-001","quantity":500}]]]"#,
      )
      .unwrap();

    let cache = Cache::load(storage);
    assert_eq!(
      cache.get("GET:/inventory/materials"),
      Some(json!([{"id": "MAT-001", "quantity": 500}]))
    );
  }

  #[test]
  fn test_corrupt_snapshot_starts_empty() {
    let storage = Arc::new(MemoryStore::new());
    storage.set(CACHE_SNAPSHOT_KEY, "{{{ not json").unwrap();

    let cache = Cache::load(storage);
    assert!(cache.is_empty());
  }

  #[test]
  fn test_failed_flush_keeps_in_memory_value() {
    let cache = Cache::load(Arc::new(ReadOnlyStore));

    cache.set("GET:/quality/logs", json!([]));
    assert_eq!(cache.get("GET:/quality/logs"), Some(json!([])));
  }

  #[test]
  fn test_invalidate_reaches_filtered_queries() {
    let (_storage, cache) = empty_cache();
    cache.set("GET:/inventory/materials?category=fabric", json!([]));
    cache.set("GET:/inventory/materials", json!([]));
    cache.set("GET:/sales/orders", json!([]));

    let removed = cache.invalidate("/inventory/materials");

    assert_eq!(removed, 2);
    assert_eq!(cache.keys(), vec!["GET:/sales/orders".to_string()]);
  }

  #[test]
  fn test_invalidate_item_reaches_collection() {
    let (_storage, cache) = empty_cache();
    cache.set("GET:/production/work-orders", json!([]));
    cache.set("GET:/production/work-orders/WO-7", json!({}));
    cache.set("GET:/sales/customers", json!([]));

    cache.invalidate("/production/work-orders/WO-7");

    assert!(!cache.contains("GET:/production/work-orders"));
    assert!(!cache.contains("GET:/production/work-orders/WO-7"));
    assert!(cache.contains("GET:/sales/customers"));
  }

  #[test]
  fn test_invalidate_is_persisted() {
    let (storage, cache) = empty_cache();
    cache.set("GET:/sales/orders", json!([]));

    cache.invalidate("/sales/orders");

    let reloaded = Cache::load(storage);
    assert!(reloaded.is_empty());
  }

  #[test]
  fn test_clear_empties_and_flushes() {
    let (storage, cache) = empty_cache();
    cache.set("GET:/sales/orders", json!([]));
    cache.set("GET:/quality/logs", json!([]));

    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(
      storage.get(CACHE_SNAPSHOT_KEY).unwrap().as_deref(),
      Some("[]")
    );
  }
}
