//! Endpoint-keyed pub/sub for data change notifications.

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::error;

/// Callback invoked with the new value for an endpoint.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
  next_id: u64,
  topics: HashMap<String, Vec<(u64, Callback)>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
  registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Callback registry keyed by endpoint.
#[derive(Clone, Default)]
pub struct Subscribers {
  registry: Arc<Mutex<Registry>>,
}

/// Handle returned by [`Subscribers::subscribe`]; pass it back to stop
/// receiving notifications.
#[derive(Debug)]
#[must_use = "dropping the handle keeps the callback registered with no way to remove it"]
pub struct Subscription {
  endpoint: String,
  id: u64,
  registry: Weak<Mutex<Registry>>,
}

impl Subscription {
  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  /// Remove the callback. A no-op if the manager is already gone.
  pub fn unsubscribe(self) {
    let Some(registry) = self.registry.upgrade() else {
      return;
    };

    let mut registry = lock(&registry);
    if let Some(callbacks) = registry.topics.get_mut(&self.endpoint) {
      callbacks.retain(|(id, _)| *id != self.id);
      if callbacks.is_empty() {
        registry.topics.remove(&self.endpoint);
      }
    }
  }
}

impl Subscribers {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe<F>(&self, endpoint: &str, callback: F) -> Subscription
  where
    F: Fn(&Value) + Send + Sync + 'static,
  {
    let mut registry = lock(&self.registry);
    let id = registry.next_id;
    registry.next_id += 1;
    registry
      .topics
      .entry(endpoint.to_string())
      .or_default()
      .push((id, Arc::new(callback)));

    Subscription {
      endpoint: endpoint.to_string(),
      id,
      registry: Arc::downgrade(&self.registry),
    }
  }

  /// Invoke every callback registered for `endpoint`, in subscription order.
  ///
  /// A panicking callback is logged and skipped; the rest still run.
  /// Callbacks run without the registry lock held, so they may subscribe or
  /// unsubscribe. Returns the number of callbacks that completed.
  pub fn notify(&self, endpoint: &str, value: &Value) -> usize {
    let callbacks: Vec<Callback> = match lock(&self.registry).topics.get(endpoint) {
      Some(callbacks) => callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
      None => return 0,
    };

    let mut delivered = 0;
    for callback in callbacks {
      match panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
        Ok(()) => delivered += 1,
        Err(_) => error!(endpoint, "Listener error: subscriber panicked"),
      }
    }
    delivered
  }

  /// Number of callbacks registered for `endpoint`.
  pub fn count(&self, endpoint: &str) -> usize {
    lock(&self.registry)
      .topics
      .get(endpoint)
      .map_or(0, Vec::len)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |v: &Value| sink.lock().unwrap().push(v.clone()))
  }

  #[test]
  fn test_notify_reaches_only_matching_endpoint() {
    let subscribers = Subscribers::new();
    let (orders, on_orders) = recorder();
    let (logs, on_logs) = recorder();
    let _a = subscribers.subscribe("/sales/orders", on_orders);
    let _b = subscribers.subscribe("/quality/logs", on_logs);

    assert_eq!(subscribers.notify("/sales/orders", &json!({"id": "SO-1"})), 1);

    assert_eq!(*orders.lock().unwrap(), vec![json!({"id": "SO-1"})]);
    assert!(logs.lock().unwrap().is_empty());
  }

  #[test]
  fn test_panicking_subscriber_does_not_stop_others() {
    let subscribers = Subscribers::new();
    let (seen, on_value) = recorder();
    let _bad = subscribers.subscribe("/inventory/materials", |_| panic!("render failed"));
    let _good = subscribers.subscribe("/inventory/materials", on_value);

    let delivered = subscribers.notify("/inventory/materials", &json!([]));

    assert_eq!(delivered, 1);
    assert_eq!(seen.lock().unwrap().len(), 1);

    // The registry is still usable afterwards
    subscribers.notify("/inventory/materials", &json!([1]));
    assert_eq!(seen.lock().unwrap().len(), 2);
  }

  #[test]
  fn test_unsubscribe_removes_only_that_callback() {
    let subscribers = Subscribers::new();
    let (first, on_first) = recorder();
    let (second, on_second) = recorder();
    let a = subscribers.subscribe("/sales/customers", on_first);
    let _b = subscribers.subscribe("/sales/customers", on_second);

    a.unsubscribe();
    subscribers.notify("/sales/customers", &json!([]));

    assert!(first.lock().unwrap().is_empty());
    assert_eq!(second.lock().unwrap().len(), 1);
    assert_eq!(subscribers.count("/sales/customers"), 1);
  }

  #[test]
  fn test_unsubscribe_after_registry_dropped_is_noop() {
    let subscribers = Subscribers::new();
    let handle = subscribers.subscribe("/sales/orders", |_| {});
    drop(subscribers);
    handle.unsubscribe();
  }

  #[test]
  fn test_callback_may_subscribe_during_notify() {
    let subscribers = Subscribers::new();
    let inner = subscribers.clone();
    let _outer = subscribers.subscribe("/production/work-orders", move |_| {
      let _ = inner.subscribe("/production/work-orders", |_| {});
    });

    subscribers.notify("/production/work-orders", &Value::Null);
    assert_eq!(subscribers.count("/production/work-orders"), 2);
  }
}
