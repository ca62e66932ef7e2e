//! reqwest-backed transport.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;

use super::{Method, Request, Transport, TransportError};

/// Transport that talks to the ERP API over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("erp-sync/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Delete => reqwest::Method::DELETE,
    }
  }
}

impl Transport for HttpTransport {
  async fn send(&self, request: Request) -> Result<Value, TransportError> {
    let mut builder = self
      .client
      .request(request.method.into(), &request.url)
      .timeout(request.timeout);

    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }

    if let Some(body) = &request.body {
      let bytes = serde_json::to_vec(body)
        .map_err(|e| TransportError::Parse(format!("failed to encode request body: {}", e)))?;
      builder = builder.body(bytes);
    }

    let response = builder.send().await.map_err(classify)?;
    let status = response.status();
    let bytes = response.bytes().await.map_err(classify)?;

    if !status.is_success() {
      return Err(TransportError::Http {
        status: status.as_u16(),
        body: error_body(&bytes),
      });
    }

    decode_body(&bytes)
  }
}

/// Map a reqwest failure onto the transport taxonomy.
fn classify(err: reqwest::Error) -> TransportError {
  if err.is_timeout() {
    TransportError::Timeout
  } else if err.is_decode() {
    TransportError::Parse(err.to_string())
  } else {
    TransportError::NetworkUnreachable(err.to_string())
  }
}

/// Decode a successful response body. An empty body (typical for DELETE) is `null`.
fn decode_body(bytes: &[u8]) -> Result<Value, TransportError> {
  if bytes.iter().all(u8::is_ascii_whitespace) {
    return Ok(Value::Null);
  }
  serde_json::from_slice(bytes).map_err(|e| TransportError::Parse(e.to_string()))
}

/// Decode an error body, keeping non-JSON bodies as plain text.
fn error_body(bytes: &[u8]) -> Value {
  if bytes.iter().all(u8::is_ascii_whitespace) {
    return Value::Null;
  }
  serde_json::from_slice(bytes)
    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
