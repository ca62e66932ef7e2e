//! FIFO queue of mutations waiting for connectivity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::error::DataError;
use crate::transport::{Method, TransportError};

/// Kind of a mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
  Create,
  Update,
  Delete,
}

impl OperationKind {
  /// HTTP method the operation is sent with.
  pub fn method(&self) -> Method {
    match self {
      OperationKind::Create => Method::Post,
      OperationKind::Update => Method::Put,
      OperationKind::Delete => Method::Delete,
    }
  }
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      OperationKind::Create => "create",
      OperationKind::Update => "update",
      OperationKind::Delete => "delete",
    })
  }
}

/// A mutation that has not reached the server yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
  pub kind: OperationKind,
  pub endpoint: String,
  pub payload: Option<Value>,
  pub enqueued_at: DateTime<Utc>,
}

impl PendingOperation {
  pub fn new(kind: OperationKind, endpoint: impl Into<String>, payload: Option<Value>) -> Self {
    Self {
      kind,
      endpoint: endpoint.into(),
      payload,
      enqueued_at: Utc::now(),
    }
  }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
  /// Operations taken off the queue in this pass
  pub attempted: usize,
  /// Operations the server accepted
  pub replayed: usize,
  /// Operations that failed and went back to the tail
  pub requeued: usize,
  /// One `QueueReplay` error per requeued operation
  pub errors: Vec<DataError>,
}

/// In-memory FIFO of pending operations with a single-flight drain.
#[derive(Debug, Default)]
pub struct SyncQueue {
  pending: Mutex<VecDeque<PendingOperation>>,
  draining: AtomicBool,
  /// Set by a drain request that found another drain running
  rerun: AtomicBool,
}

/// Clears the draining flag when a drain ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

impl SyncQueue {
  pub fn new() -> Self {
    Self::default()
  }

  fn pending(&self) -> MutexGuard<'_, VecDeque<PendingOperation>> {
    self.pending.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Append to the tail. No deduplication.
  pub fn enqueue(&self, op: PendingOperation) {
    self.pending().push_back(op);
  }

  pub fn size(&self) -> usize {
    self.pending().len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending().is_empty()
  }

  /// Copy of the queue in replay order.
  pub fn snapshot(&self) -> Vec<PendingOperation> {
    self.pending().iter().cloned().collect()
  }

  pub fn is_draining(&self) -> bool {
    self.draining.load(Ordering::SeqCst)
  }

  fn try_begin_drain(&self) -> Option<DrainGuard<'_>> {
    self
      .draining
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .ok()
      .map(|_| DrainGuard(&self.draining))
  }

  fn pop_front(&self) -> Option<PendingOperation> {
    self.pending().pop_front()
  }

  /// Replay every queued operation, oldest first.
  ///
  /// Each pass attempts the operations queued when it starts. Each one is
  /// removed before it is replayed; a failed one goes back to the tail,
  /// behind everything not yet attempted, and the pass moves on.
  ///
  /// Only one drain runs at a time. A request that arrives while another
  /// drain is running returns `None` and makes the running drain do one more
  /// pass before it finishes, so operations enqueued in the meantime are
  /// not left behind. The returned report covers every pass.
  pub async fn drain<F, Fut>(&self, mut replay: F) -> Option<DrainReport>
  where
    F: FnMut(PendingOperation) -> Fut,
    Fut: Future<Output = Result<(), TransportError>>,
  {
    // Flag first: a running drain that misses it before releasing the guard
    // still sees it afterwards.
    self.rerun.store(true, Ordering::SeqCst);
    let Some(mut guard) = self.try_begin_drain() else {
      debug!("Drain already in progress, another pass requested");
      return None;
    };

    let mut report = DrainReport::default();
    loop {
      self.rerun.store(false, Ordering::SeqCst);
      self.run_pass(&mut report, &mut replay).await;

      if self.rerun.load(Ordering::SeqCst) {
        continue;
      }
      drop(guard);

      // A request that lost the race with the release above
      if !self.rerun.load(Ordering::SeqCst) {
        break;
      }
      match self.try_begin_drain() {
        Some(next) => guard = next,
        None => break,
      }
    }

    let remaining = self.size();
    if remaining > 0 {
      warn!(remaining, "Operations still pending");
    } else if report.attempted > 0 {
      info!("All queued operations synced");
    }

    Some(report)
  }

  async fn run_pass<F, Fut>(&self, report: &mut DrainReport, replay: &mut F)
  where
    F: FnMut(PendingOperation) -> Fut,
    Fut: Future<Output = Result<(), TransportError>>,
  {
    let pass = self.size();
    if pass == 0 {
      return;
    }

    info!(pending = pass, "Processing queued operations");

    for _ in 0..pass {
      let Some(op) = self.pop_front() else {
        break;
      };
      report.attempted += 1;

      match replay(op.clone()).await {
        Ok(()) => {
          debug!(kind = %op.kind, endpoint = %op.endpoint, "Replayed queued operation");
          report.replayed += 1;
        }
        Err(source) => {
          let err = DataError::QueueReplay {
            kind: op.kind,
            endpoint: op.endpoint.clone(),
            source,
          };
          warn!(error = %err, "Sync error, operation re-queued");
          self.enqueue(op);
          report.requeued += 1;
          report.errors.push(err);
        }
      }
    }
  }
}
