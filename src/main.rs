mod logging;
mod shell;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use erp_sync::cache::{clear_auth_token, load_auth_token, save_auth_token};
use erp_sync::commands::parse_payload;
use erp_sync::erp::resolve_endpoint;
use erp_sync::{Config, DataManager, HttpTransport, KvStore, MemoryStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "erp-sync")]
#[command(about = "Offline-first client for the textile ERP API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/erp-sync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Keep cache and token in memory only
  #[arg(long, global = true)]
  ephemeral: bool,

  /// Debug-level logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Write logs to a daily file in this directory instead of stderr
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Read an endpoint (served from cache when possible)
  Get {
    endpoint: String,
    /// Always ask the server
    #[arg(long)]
    no_cache: bool,
  },
  /// POST a JSON payload
  Create { endpoint: String, payload: String },
  /// PUT a JSON payload
  Update { endpoint: String, payload: String },
  /// DELETE an endpoint
  Delete { endpoint: String },
  /// Print connectivity, cache and queue diagnostics
  Status,
  /// Empty the persisted response cache
  ClearCache,
  /// Manage the stored bearer token
  Token {
    #[command(subcommand)]
    action: TokenAction,
  },
  /// Interactive shell (default)
  Shell,
}

#[derive(Subcommand, Debug)]
enum TokenAction {
  Set { token: String },
  Clear,
  Show,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = logging::init(args.verbose, args.log_dir.as_deref())?;

  let config = Config::load(args.config.as_deref())?;
  let command = args.command.unwrap_or(Cmd::Shell);

  if args.ephemeral {
    run(config, Arc::new(MemoryStore::new()), command).await
  } else {
    let store = match &config.storage.path {
      Some(path) => SqliteStore::open_at(path)?,
      None => SqliteStore::open()?,
    };
    run(config, Arc::new(store), command).await
  }
}

async fn run<S: KvStore + 'static>(config: Config, storage: Arc<S>, command: Cmd) -> Result<()> {
  let transport = HttpTransport::new()?;
  let manager = DataManager::new(&config.api, transport, Arc::clone(&storage));

  match command {
    Cmd::Get { endpoint, no_cache } => {
      let value = manager.read(&resolve_endpoint(&endpoint), !no_cache).await?;
      shell::print_json(&value);
    }
    Cmd::Create { endpoint, payload } => {
      let outcome = manager
        .create(&resolve_endpoint(&endpoint), parse_payload(&payload)?)
        .await?;
      shell::print_json(&outcome.into_value());
    }
    Cmd::Update { endpoint, payload } => {
      let outcome = manager
        .update(&resolve_endpoint(&endpoint), parse_payload(&payload)?)
        .await?;
      shell::print_json(&outcome.into_value());
    }
    Cmd::Delete { endpoint } => {
      let outcome = manager.remove(&resolve_endpoint(&endpoint)).await?;
      shell::print_json(&outcome.into_value());
    }
    Cmd::Status => {
      println!("{}", serde_json::to_string_pretty(&manager.status())?);
    }
    Cmd::ClearCache => {
      manager.clear_cache();
      println!("cache cleared");
    }
    Cmd::Token { action } => match action {
      TokenAction::Set { token } => save_auth_token(&*storage, &token)?,
      TokenAction::Clear => clear_auth_token(&*storage)?,
      TokenAction::Show => match load_auth_token(&*storage) {
        Some(token) => println!("{}", token),
        None => println!("(no token)"),
      },
    },
    Cmd::Shell => {
      shell::run(manager, &config.api.base_url, &config.connectivity).await?;
    }
  }

  Ok(())
}
