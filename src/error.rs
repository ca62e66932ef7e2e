use crate::sync::OperationKind;
use crate::transport::TransportError;

/// Errors surfaced by the data manager.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error("offline and no cached data available for {endpoint}")]
  Offline { endpoint: String },

  #[error("replay of queued {kind} on {endpoint} failed: {source}")]
  QueueReplay {
    kind: OperationKind,
    endpoint: String,
    source: TransportError,
  },
}

impl DataError {
  /// The underlying transport failure, if any.
  pub fn transport(&self) -> Option<&TransportError> {
    match self {
      DataError::Transport(err) | DataError::QueueReplay { source: err, .. } => Some(err),
      DataError::Offline { .. } => None,
    }
  }

  pub fn is_offline(&self) -> bool {
    matches!(self, DataError::Offline { .. })
  }
}
