use color_eyre::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Logs go to stderr unless `log_dir` is given, in
/// which case they roll daily into `erp-sync.log`. Keep the returned guard
/// alive for the life of the process or buffered lines are lost.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Result<WorkerGuard> {
  let default_directive = if verbose {
    "erp_sync=debug"
  } else {
    "erp_sync=info"
  };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

  let (writer, guard) = match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)?;
      tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "erp-sync.log"))
    }
    None => tracing_appender::non_blocking(std::io::stderr()),
  };

  tracing_subscriber::registry()
    .with(
      fmt::layer()
        .with_target(false)
        .with_ansi(log_dir.is_none())
        .with_writer(writer),
    )
    .with(filter)
    .try_init()?;

  Ok(guard)
}
