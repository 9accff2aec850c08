//! `portaria`: console menu for the gatehouse register.
//!
//! # Usage
//!
//! ```
//! portaria
//! portaria --store ~/portaria.db
//! portaria --config /etc/portaria.toml
//! ```

mod app;

use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use portaria_core::PresenceEngine;
use portaria_store_sqlite::{SqliteStore, expand_tilde};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "portaria", about = "Console menu for the Portaria gatehouse register")]
struct Args {
  /// Path to a TOML config file (store_path).
  #[arg(short, long, value_name = "FILE", default_value = "portaria.toml")]
  config: PathBuf,

  /// Database file; overrides `store_path` from the config.
  #[arg(long, env = "PORTARIA_STORE")]
  store: Option<PathBuf>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ConsoleConfig {
  store_path: PathBuf,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  // Logs go to stderr so they never interleave with the menu on stdout.
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let cfg: ConsoleConfig = config::Config::builder()
    .set_default("store_path", "portaria.db")?
    .add_source(config::File::from(args.config).required(false))
    .add_source(config::Environment::with_prefix("PORTARIA"))
    .set_override_option("store_path", args.store.map(|p| p.display().to_string()))?
    .build()
    .context("reading config file")?
    .try_deserialize()
    .context("parsing config file")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("opening store at {}", store_path.display()))?;

  let mut app = App::new(PresenceEngine::new(store), io::stdin().lock(), io::stdout());
  let result = app.run().await;

  app
    .into_engine()
    .into_store()
    .close()
    .await
    .context("closing store")?;
  result
}
