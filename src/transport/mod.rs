//! Stateless HTTP-like transport for the ERP API.
//!
//! A [`Transport`] takes one [`Request`] and yields either the parsed JSON
//! body or a [`TransportError`] classified into one of four kinds, so callers
//! can decide whether a failure is worth retrying:
//! - `Timeout` and `NetworkUnreachable` are transient
//! - `Http` and `Parse` are not

mod http;
mod retry;
#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpTransport;
pub use retry::RetryPolicy;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// HTTP methods used against the ERP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  Get,
  Post,
  Put,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A single request handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
  pub method: Method,
  pub url: String,
  pub headers: Vec<(String, String)>,
  pub body: Option<Value>,
  pub timeout: Duration,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      headers: Vec::new(),
      body: None,
      timeout: DEFAULT_TIMEOUT,
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Look up a header value by case-insensitive name.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Classified transport failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
  #[error("request timed out")]
  Timeout,

  #[error("network unreachable: {0}")]
  NetworkUnreachable(String),

  #[error("HTTP {status}: {}", describe_body(.body))]
  Http { status: u16, body: Value },

  #[error("malformed response: {0}")]
  Parse(String),
}

impl TransportError {
  /// Whether a retry might succeed.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      TransportError::Timeout | TransportError::NetworkUnreachable(_)
    )
  }

  /// HTTP status for `Http` failures.
  pub fn status(&self) -> Option<u16> {
    match self {
      TransportError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  /// Human-readable message, preferring the server's `detail`/`message` field.
  pub fn message(&self) -> String {
    match self {
      TransportError::Http { body, .. } => describe_body(body),
      other => other.to_string(),
    }
  }
}

/// Extract the readable part of an error body.
///
/// The API puts it in `detail` (FastAPI style) or `message`; anything else is
/// rendered as-is.
fn describe_body(body: &Value) -> String {
  for field in ["detail", "message"] {
    match body.get(field) {
      Some(Value::String(s)) => return s.clone(),
      Some(other) if !other.is_null() => return other.to_string(),
      _ => {}
    }
  }

  match body {
    Value::Null => "no details".to_string(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Issues requests against the upstream API.
///
/// Implementations hold no per-request state; everything a request needs
/// travels in the [`Request`].
pub trait Transport: Send + Sync + 'static {
  fn send(&self, request: Request) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
  fn send(&self, request: Request) -> impl Future<Output = Result<Value, TransportError>> + Send {
    (**self).send(request)
  }
}
