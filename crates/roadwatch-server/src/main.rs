//! roadwatch server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, seeds configured incident types, starts the event outbox and the
//! moderation scheduler, and serves the JSON API until Ctrl-C.

mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use roadwatch_api::{AppState, HttpIdentityResolver};
use roadwatch_core::{clock::SystemClock, store::IncidentStore as _};
use roadwatch_engine::{
  Engine, EngineConfig, Scheduler,
  bus::{LogBus, RedisBus},
  notifier::Notifier,
};
use roadwatch_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{BusKind, ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Road incident lifecycle and moderation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  // Store.
  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  for input in cfg.incident_types.iter().cloned() {
    let name = input.name.clone();
    let kind = store
      .ensure_type(input)
      .await
      .with_context(|| format!("failed to seed incident type {name:?}"))?;
    tracing::info!(type_id = kind.type_id, name = %kind.name, "incident type ready");
  }

  // Events.
  let (notifier, outbox) = Notifier::new(cfg.bus.capacity);
  let outbox_task = match cfg.bus.kind {
    BusKind::Redis => {
      let url = cfg.bus.url.as_deref().context("bus.url is required for the redis bus")?;
      let bus = RedisBus::connect(url)
        .await
        .with_context(|| format!("failed to connect to redis at {url}"))?;
      outbox.spawn(bus)
    }
    BusKind::Log => outbox.spawn(LogBus),
  };

  // Moderation.
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let scheduler = Scheduler::new(
    store.clone(),
    SystemClock,
    notifier.clone(),
    cfg.bus.channel.clone(),
    Duration::from_secs(cfg.moderation_interval_secs.max(1)),
  );
  let scheduler_task = scheduler.spawn(shutdown_rx);

  // HTTP.
  let engine_config = EngineConfig::for_environment(&cfg.environment, cfg.bus.channel.clone());
  tracing::info!(
    environment = %cfg.environment,
    report_cooldown = engine_config.enforce_report_cooldown,
    "engine configured"
  );
  let engine = Engine::new(store, SystemClock, notifier, engine_config);
  let identity = HttpIdentityResolver::new(cfg.users_base_url.clone())
    .context("failed to build identity service client")?;
  let app = roadwatch_api::router(AppState::new(Arc::new(engine), Arc::new(identity)));

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // The router and its engine are gone; stopping the scheduler drops the last
  // notifier, which lets the outbox drain and exit.
  let _ = shutdown_tx.send(true);
  if let Err(e) = scheduler_task.await {
    tracing::error!(error = %e, "moderation scheduler panicked");
  }
  if tokio::time::timeout(Duration::from_secs(5), outbox_task).await.is_err() {
    tracing::warn!("event outbox did not drain in time");
  }

  tracing::info!("shut down");
  Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => tracing::info!("received Ctrl-C"),
    _ = terminate => tracing::info!("received SIGTERM"),
  }
}
