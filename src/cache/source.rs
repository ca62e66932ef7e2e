//! Provenance of data returned by a read.

/// Result from a read, including where the data came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Fresh data from the network.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// A cache hit served without touching the network.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }

  /// Cached data served because connectivity is down.
  pub fn offline(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
    }
  }

  /// Cached data served because the network fetch failed.
  pub fn fallback(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Fallback,
    }
  }
}

/// Indicates where read data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Cache hit, no network call made
  Cache,
  /// Offline mode - connectivity down, serving cached data
  Offline,
  /// Network fetch failed, serving cached data
  Fallback,
}

impl CacheSource {
  /// Whether the data may be older than what the server holds.
  pub fn is_stale(&self) -> bool {
    matches!(self, CacheSource::Offline | CacheSource::Fallback)
  }
}
