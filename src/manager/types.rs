use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::sync::PendingOperation;

/// Acknowledgement for a mutation that was queued instead of sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueuedAck {
  pub queued: bool,
  /// Enqueue time in epoch milliseconds
  pub id: i64,
}

impl QueuedAck {
  pub fn for_operation(op: &PendingOperation) -> Self {
    Self {
      queued: true,
      id: op.enqueued_at.timestamp_millis(),
    }
  }
}

/// Result of a create/update/remove call.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
  /// The server accepted the mutation and returned this body
  Applied(Value),
  /// Connectivity is down; the mutation waits in the sync queue
  Queued(QueuedAck),
}

impl MutationOutcome {
  pub fn is_queued(&self) -> bool {
    matches!(self, MutationOutcome::Queued(_))
  }

  /// The server body, or `{"queued": true, "id": ...}` for queued mutations.
  pub fn into_value(self) -> Value {
    match self {
      MutationOutcome::Applied(value) => value,
      MutationOutcome::Queued(ack) => json!({ "queued": ack.queued, "id": ack.id }),
    }
  }
}

/// Read-only diagnostics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
  pub online: bool,
  pub cache_size: usize,
  pub queued_operations: usize,
  pub draining: bool,
  pub timestamp: DateTime<Utc>,
}
