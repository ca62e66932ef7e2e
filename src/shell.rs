use color_eyre::Result;
use serde_json::Value;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use erp_sync::commands::{self, ShellCommand};
use erp_sync::config::ConnectivityConfig;
use erp_sync::{
  ConnectivityEvent, ConnectivityHandler, DataManager, DrainReport, HttpTransport, KvStore,
};

/// Interactive loop over stdin. Returns on `quit` or end of input.
pub async fn run<S: KvStore + 'static>(
  manager: DataManager<HttpTransport, S>,
  base_url: &str,
  connectivity: &ConnectivityConfig,
) -> Result<()> {
  let handler = ConnectivityHandler::new();
  let probe = match connectivity.probe_interval() {
    Some(interval) => match handler.spawn_probe(base_url, interval) {
      Ok(task) => Some(task),
      Err(e) => {
        warn!(error = %e, "Connectivity probe disabled");
        None
      }
    },
    None => None,
  };
  let watcher = manager.watch(handler);

  println!("erp-sync shell - type 'help' for commands");
  let mut lines = BufReader::new(tokio::io::stdin()).lines();

  loop {
    prompt(&manager);
    let Some(line) = lines.next_line().await? else {
      break;
    };

    let command = match commands::parse(&line) {
      Ok(Some(command)) => command,
      Ok(None) => continue,
      Err(e) => {
        eprintln!("{}", e);
        continue;
      }
    };
    debug!(?command, "Shell command");

    if command == ShellCommand::Quit {
      break;
    }
    execute(&manager, command).await;
  }

  if let Some(probe) = probe {
    probe.abort();
  }
  watcher.abort();
  Ok(())
}

fn prompt<S: KvStore + 'static>(manager: &DataManager<HttpTransport, S>) {
  let status = manager.status();
  let mode = if status.online { "online" } else { "offline" };
  if status.queued_operations > 0 {
    print!("[{} +{}] > ", mode, status.queued_operations);
  } else {
    print!("[{}] > ", mode);
  }
  let _ = std::io::stdout().flush();
}

async fn execute<S: KvStore + 'static>(
  manager: &DataManager<HttpTransport, S>,
  command: ShellCommand,
) {
  match command {
    ShellCommand::Get {
      endpoint,
      use_cache,
    } => match manager.read_with_source(&endpoint, use_cache).await {
      Ok(result) => {
        if result.source.is_stale() {
          eprintln!("(stale: served from cache)");
        }
        print_json(&result.data);
      }
      Err(e) => eprintln!("error: {}", e),
    },
    ShellCommand::Create { endpoint, payload } => {
      print_outcome(manager.create(&endpoint, payload).await)
    }
    ShellCommand::Update { endpoint, payload } => {
      print_outcome(manager.update(&endpoint, payload).await)
    }
    ShellCommand::Delete { endpoint } => print_outcome(manager.remove(&endpoint).await),
    ShellCommand::Online => {
      match manager.handle_connectivity(ConnectivityEvent::Online).await {
        Some(report) => print_report(&report),
        None => println!("online"),
      }
    }
    ShellCommand::Offline => {
      manager.handle_connectivity(ConnectivityEvent::Offline).await;
      println!("offline - mutations will be queued");
    }
    ShellCommand::Sync => match manager.sync_now().await {
      Some(report) => print_report(&report),
      None => println!("a sync is already running"),
    },
    ShellCommand::Status => match serde_json::to_value(manager.status()) {
      Ok(value) => print_json(&value),
      Err(e) => eprintln!("error: {}", e),
    },
    ShellCommand::Queue => {
      let pending = manager.pending_operations();
      if pending.is_empty() {
        println!("queue is empty");
      }
      for (i, op) in pending.iter().enumerate() {
        println!(
          "{:>3}. {:<6} {} ({})",
          i + 1,
          op.kind,
          op.endpoint,
          op.enqueued_at.format("%H:%M:%S")
        );
      }
    }
    ShellCommand::Clear => {
      manager.clear_cache();
      println!("cache cleared");
    }
    ShellCommand::Help => println!("{}", commands::help_text()),
    ShellCommand::Quit => {}
  }
}

fn print_outcome(outcome: Result<erp_sync::MutationOutcome, erp_sync::DataError>) {
  match outcome {
    Ok(outcome) => {
      if outcome.is_queued() {
        eprintln!("(queued until back online)");
      }
      print_json(&outcome.into_value());
    }
    Err(e) => eprintln!("error: {}", e),
  }
}

fn print_report(report: &DrainReport) {
  println!(
    "synced {}/{} queued operations",
    report.replayed, report.attempted
  );
  for error in &report.errors {
    eprintln!("  requeued: {}", error);
  }
}

pub fn print_json(value: &Value) {
  match serde_json::to_string_pretty(value) {
    Ok(text) => println!("{}", text),
    Err(_) => println!("{}", value),
  }
}
