//! Message bus backends that incident events are published to.

use std::{
  future::Future,
  sync::{Arc, Mutex},
};

use redis::{AsyncCommands as _, aio::MultiplexedConnection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
  #[error("redis error: {0}")]
  Redis(#[from] redis::RedisError),

  #[error("bus unavailable: {0}")]
  Unavailable(String),
}

/// A publish/subscribe transport. Delivery is at-most-once; callers log
/// failures and move on.
pub trait MessageBus: Send + Sync + 'static {
  fn publish(
    &self,
    channel: &str,
    payload: &str,
  ) -> impl Future<Output = Result<(), BusError>> + Send;
}

// ─── Redis ───────────────────────────────────────────────────────────────────

/// Publishes with Redis `PUBLISH` over a shared multiplexed connection.
#[derive(Clone)]
pub struct RedisBus {
  conn: MultiplexedConnection,
}

impl RedisBus {
  pub async fn connect(url: &str) -> Result<Self, BusError> {
    let client = redis::Client::open(url)?;
    let conn = client.get_multiplexed_async_connection().await?;
    tracing::info!(url, "connected to redis");
    Ok(Self { conn })
  }
}

impl MessageBus for RedisBus {
  async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
    let mut conn = self.conn.clone();
    let receivers: i64 = conn.publish(channel, payload).await?;
    tracing::trace!(channel, receivers, "published");
    Ok(())
  }
}

// ─── Log ─────────────────────────────────────────────────────────────────────

/// Writes every message to the log instead of a broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBus;

impl MessageBus for LogBus {
  async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
    tracing::info!(channel, payload, "incident event");
    Ok(())
  }
}

// ─── Memory ──────────────────────────────────────────────────────────────────

/// Keeps published messages in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
  messages: Arc<Mutex<Vec<(String, String)>>>,
  failing:  Arc<Mutex<bool>>,
}

impl MemoryBus {
  pub fn new() -> Self { Self::default() }

  /// `(channel, payload)` pairs in publish order.
  pub fn messages(&self) -> Vec<(String, String)> {
    self.messages.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  /// Make subsequent publishes fail with [`BusError::Unavailable`].
  pub fn set_failing(&self, failing: bool) {
    *self.failing.lock().unwrap_or_else(|p| p.into_inner()) = failing;
  }
}

impl MessageBus for MemoryBus {
  async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
    if *self.failing.lock().unwrap_or_else(|p| p.into_inner()) {
      return Err(BusError::Unavailable("memory bus set to fail".into()));
    }
    self
      .messages
      .lock()
      .unwrap_or_else(|p| p.into_inner())
      .push((channel.to_owned(), payload.to_owned()));
    Ok(())
  }
}
