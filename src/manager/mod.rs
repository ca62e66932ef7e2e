//! The data manager: the one object consumers use to read and write ERP data.
//!
//! It composes the response cache, the retry-wrapped transport, the sync
//! queue, a connectivity flag and endpoint subscriptions:
//! - reads are served from cache when possible and fall back to stale cache
//!   when the network fails or connectivity is down
//! - mutations go straight to the server when online and are queued
//!   otherwise; a mutation that fails while online is queued *and* reported
//! - going back online replays the queue once
//!
//! Construct one manager per process and hand clones to consumers; clones
//! share all state.

mod subscribers;
mod types;

pub use subscribers::{Callback, Subscribers, Subscription};
pub use types::{MutationOutcome, QueuedAck, Status};

use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{cache_key, load_auth_token, Cache, CacheResult, KvStore};
use crate::config::ApiConfig;
use crate::error::DataError;
use crate::sync::{
  ConnectivityEvent, ConnectivityHandler, DrainReport, OperationKind, PendingOperation, SyncQueue,
};
use crate::transport::{Method, Request, RetryPolicy, Transport, TransportError};

struct Inner<T, S: KvStore> {
  base_url: String,
  timeout: Duration,
  retry: RetryPolicy,
  transport: T,
  storage: Arc<S>,
  cache: Cache<S>,
  queue: SyncQueue,
  online: AtomicBool,
  subscribers: Subscribers,
}

/// Cache-first, offline-tolerant access to the ERP API.
pub struct DataManager<T: Transport, S: KvStore> {
  inner: Arc<Inner<T, S>>,
}

impl<T: Transport, S: KvStore> Clone for DataManager<T, S> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T: Transport, S: KvStore + 'static> DataManager<T, S> {
  /// Create a manager. The cache is hydrated from `storage`; connectivity
  /// starts as online.
  pub fn new(api: &ApiConfig, transport: T, storage: Arc<S>) -> Self {
    let cache = Cache::load(Arc::clone(&storage));
    let base_url = api.base_url.trim_end_matches('/').to_string();

    info!(base_url = %base_url, cached = cache.len(), "Data manager ready");

    Self {
      inner: Arc::new(Inner {
        base_url,
        timeout: api.timeout(),
        retry: api.retry,
        transport,
        storage,
        cache,
        queue: SyncQueue::new(),
        online: AtomicBool::new(true),
        subscribers: Subscribers::new(),
      }),
    }
  }

  pub fn is_online(&self) -> bool {
    self.inner.online.load(Ordering::SeqCst)
  }

  /// Apply a connectivity signal and wait for any drain it starts.
  ///
  /// Only an offline-to-online transition drains the queue; its report is
  /// returned. Request failures never change connectivity.
  pub async fn handle_connectivity(&self, event: ConnectivityEvent) -> Option<DrainReport> {
    if self.set_connectivity(event) {
      self.sync_now().await
    } else {
      None
    }
  }

  /// Update the connectivity flag. Returns true when the queue should drain.
  fn set_connectivity(&self, event: ConnectivityEvent) -> bool {
    match event {
      ConnectivityEvent::Offline => {
        if self.inner.online.swap(false, Ordering::SeqCst) {
          info!("Offline - operations will be queued");
        }
        false
      }
      ConnectivityEvent::Online => {
        if self.inner.online.swap(true, Ordering::SeqCst) {
          return false;
        }
        info!(
          queued = self.inner.queue.size(),
          "Online - syncing queued operations"
        );
        true
      }
    }
  }

  /// Apply every event from `handler` as it arrives.
  ///
  /// Drains run on their own tasks so later signals are never held up by a
  /// replay in progress.
  pub fn watch(&self, mut handler: ConnectivityHandler) -> JoinHandle<()> {
    let manager = self.clone();
    tokio::spawn(async move {
      while let Some(event) = handler.next().await {
        if manager.set_connectivity(event) {
          let drainer = manager.clone();
          tokio::spawn(async move {
            if let Some(report) = drainer.sync_now().await {
              debug!(
                replayed = report.replayed,
                requeued = report.requeued,
                "Background sync finished"
              );
            }
          });
        }
      }
    })
  }

  /// Read `endpoint`, preferring the cache when `use_cache` is set.
  pub async fn read(&self, endpoint: &str, use_cache: bool) -> Result<Value, DataError> {
    self
      .read_with_source(endpoint, use_cache)
      .await
      .map(|result| result.data)
  }

  /// Like [`Self::read`], also reporting where the value came from.
  pub async fn read_with_source(
    &self,
    endpoint: &str,
    use_cache: bool,
  ) -> Result<CacheResult<Value>, DataError> {
    let key = cache_key(Method::Get, endpoint);

    if use_cache {
      if let Some(value) = self.inner.cache.get(&key) {
        debug!(endpoint, "Cache hit");
        return Ok(CacheResult::from_cache(value));
      }
    }

    if !self.is_online() {
      return match self.inner.cache.get(&key) {
        Some(value) => {
          warn!(endpoint, "Offline - returning cached data");
          Ok(CacheResult::offline(value))
        }
        None => Err(DataError::Offline {
          endpoint: endpoint.to_string(),
        }),
      };
    }

    match self.execute(Method::Get, endpoint, None).await {
      Ok(value) => {
        self.inner.cache.set(key, value.clone());
        self.inner.subscribers.notify(endpoint, &value);
        Ok(CacheResult::from_network(value))
      }
      Err(err) => {
        error!(endpoint, error = %err, "Error fetching");
        match self.inner.cache.get(&key) {
          Some(value) => Ok(CacheResult::fallback(value)),
          None => Err(err.into()),
        }
      }
    }
  }

  /// POST `payload` to `endpoint`.
  pub async fn create(&self, endpoint: &str, payload: Value) -> Result<MutationOutcome, DataError> {
    self
      .mutate(OperationKind::Create, endpoint, Some(payload))
      .await
  }

  /// PUT `payload` to `endpoint`.
  pub async fn update(&self, endpoint: &str, payload: Value) -> Result<MutationOutcome, DataError> {
    self
      .mutate(OperationKind::Update, endpoint, Some(payload))
      .await
  }

  /// DELETE `endpoint`.
  pub async fn remove(&self, endpoint: &str) -> Result<MutationOutcome, DataError> {
    self.mutate(OperationKind::Delete, endpoint, None).await
  }

  async fn mutate(
    &self,
    kind: OperationKind,
    endpoint: &str,
    payload: Option<Value>,
  ) -> Result<MutationOutcome, DataError> {
    if !self.is_online() {
      let op = PendingOperation::new(kind, endpoint, payload);
      let ack = QueuedAck::for_operation(&op);
      self.inner.queue.enqueue(op);
      info!(%kind, endpoint, queued = self.inner.queue.size(), "Operation queued (offline)");
      return Ok(MutationOutcome::Queued(ack));
    }

    match self.apply(kind, endpoint, payload.clone()).await {
      Ok(result) => Ok(MutationOutcome::Applied(result)),
      Err(err) => {
        error!(%kind, endpoint, error = %err, "Mutation failed, queued for replay");
        self
          .inner
          .queue
          .enqueue(PendingOperation::new(kind, endpoint, payload));
        Err(err.into())
      }
    }
  }

  /// Send a mutation; on success invalidate related cache entries and notify.
  async fn apply(
    &self,
    kind: OperationKind,
    endpoint: &str,
    payload: Option<Value>,
  ) -> Result<Value, TransportError> {
    let result = self.execute(kind.method(), endpoint, payload).await?;
    self.inner.cache.invalidate(endpoint);
    self.inner.subscribers.notify(endpoint, &result);
    Ok(result)
  }

  async fn execute(
    &self,
    method: Method,
    endpoint: &str,
    body: Option<Value>,
  ) -> Result<Value, TransportError> {
    let request = self.build_request(method, endpoint, body);
    let transport = &self.inner.transport;
    self
      .inner
      .retry
      .execute(|| transport.send(request.clone()))
      .await
  }

  fn build_request(&self, method: Method, endpoint: &str, body: Option<Value>) -> Request {
    let mut request = Request::new(method, format!("{}{}", self.inner.base_url, endpoint))
      .with_timeout(self.inner.timeout)
      .with_header("Accept", "application/json");

    if let Some(body) = body {
      request = request
        .with_header("Content-Type", "application/json")
        .with_body(body);
    }

    if let Some(token) = load_auth_token(&*self.inner.storage) {
      request = request.with_header("Authorization", format!("Bearer {}", token));
    }

    request
  }

  /// Replay the sync queue now.
  ///
  /// `None` if a drain is already running; that drain then makes one more
  /// pass so nothing queued before this call is left behind.
  pub async fn sync_now(&self) -> Option<DrainReport> {
    self
      .inner
      .queue
      .drain(|op| async move {
        self
          .apply(op.kind, &op.endpoint, op.payload)
          .await
          .map(|_| ())
      })
      .await
  }

  /// Register `callback` for values read from or written to `endpoint`.
  pub fn subscribe<F>(&self, endpoint: &str, callback: F) -> Subscription
  where
    F: Fn(&Value) + Send + Sync + 'static,
  {
    self.inner.subscribers.subscribe(endpoint, callback)
  }

  /// Deliver `value` to the subscribers of `endpoint`.
  pub fn notify(&self, endpoint: &str, value: &Value) -> usize {
    self.inner.subscribers.notify(endpoint, value)
  }

  pub fn status(&self) -> Status {
    Status {
      online: self.is_online(),
      cache_size: self.inner.cache.len(),
      queued_operations: self.inner.queue.size(),
      draining: self.inner.queue.is_draining(),
      timestamp: Utc::now(),
    }
  }

  /// Queued operations in replay order.
  pub fn pending_operations(&self) -> Vec<PendingOperation> {
    self.inner.queue.snapshot()
  }

  /// Drop cache entries related to `endpoint`.
  pub fn invalidate(&self, endpoint: &str) -> usize {
    self.inner.cache.invalidate(endpoint)
  }

  pub fn clear_cache(&self) {
    self.inner.cache.clear();
  }
}
