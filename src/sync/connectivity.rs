use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

/// How long a single reachability probe may take
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Connectivity changes reported by the hosting environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
  /// Network became available
  Online,
  /// Network went away
  Offline,
}

/// Channel of connectivity events, fed by the host and optionally by a probe
pub struct ConnectivityHandler {
  tx: mpsc::UnboundedSender<ConnectivityEvent>,
  rx: mpsc::UnboundedReceiver<ConnectivityEvent>,
}

impl Default for ConnectivityHandler {
  fn default() -> Self {
    Self::new()
  }
}

impl ConnectivityHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx }
  }

  /// Sender for pushing events into this handler
  pub fn sender(&self) -> mpsc::UnboundedSender<ConnectivityEvent> {
    self.tx.clone()
  }

  /// Spawn a probe that checks TCP reachability of the API host every
  /// `interval` and emits an event whenever reachability changes.
  ///
  /// The probe starts from the assumption that the network is up, so the
  /// first event it can emit is `Offline`.
  pub fn spawn_probe(&self, base_url: &str, interval: Duration) -> Result<JoinHandle<()>> {
    let target = probe_address(base_url)?;
    let tx = self.tx.clone();

    Ok(tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      let mut reachable = true;

      loop {
        ticker.tick().await;

        let now_reachable = matches!(
          tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(&target)).await,
          Ok(Ok(_))
        );
        if now_reachable == reachable {
          continue;
        }

        reachable = now_reachable;
        let event = if reachable {
          ConnectivityEvent::Online
        } else {
          ConnectivityEvent::Offline
        };
        debug!(target = %target, ?event, "Reachability changed");

        if tx.send(event).is_err() {
          break;
        }
      }
    }))
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<ConnectivityEvent> {
    self.rx.recv().await
  }
}

/// `host:port` to probe for a base URL.
fn probe_address(base_url: &str) -> Result<String> {
  let url = Url::parse(base_url).map_err(|e| eyre!("Invalid base URL {}: {}", base_url, e))?;
  let host = url
    .host_str()
    .ok_or_else(|| eyre!("Base URL {} has no host", base_url))?;
  let port = url
    .port_or_known_default()
    .ok_or_else(|| eyre!("Base URL {} has no port", base_url))?;

  Ok(format!("{}:{}", host, port))
}
