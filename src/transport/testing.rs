//! Scripted transport double for unit tests.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::{Request, Transport, TransportError};

/// Replays scripted results in order and records every request it sees.
///
/// Once the script is exhausted it answers with the `always` result, or with
/// `NetworkUnreachable` if none was set. A gated transport records each
/// request, then holds the answer until `gate` has a permit.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
  script: Mutex<VecDeque<Result<Value, TransportError>>>,
  always: Mutex<Option<Result<Value, TransportError>>>,
  requests: Mutex<Vec<Request>>,
  gate: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
    Self {
      gate: Some(gate),
      ..Self::default()
    }
  }

  /// Queue one result.
  pub(crate) fn respond(&self, result: Result<Value, TransportError>) -> &Self {
    self.script.lock().unwrap().push_back(result);
    self
  }

  /// Answer every unscripted request with `result`.
  pub(crate) fn always(&self, result: Result<Value, TransportError>) -> &Self {
    *self.always.lock().unwrap() = Some(result);
    self
  }

  pub(crate) fn requests(&self) -> Vec<Request> {
    self.requests.lock().unwrap().clone()
  }

  pub(crate) fn request_count(&self) -> usize {
    self.requests.lock().unwrap().len()
  }
}

impl Transport for ScriptedTransport {
  async fn send(&self, request: Request) -> Result<Value, TransportError> {
    self.requests.lock().unwrap().push(request);

    if let Some(gate) = &self.gate {
      let _permit = gate.acquire().await.unwrap();
    }

    let scripted = self.script.lock().unwrap().pop_front();
    match scripted {
      Some(result) => result,
      None => self.always.lock().unwrap().clone().unwrap_or_else(|| {
        Err(TransportError::NetworkUnreachable(
          "no scripted response".to_string(),
        ))
      }),
    }
  }
}
