//! Best-effort, non-blocking event publication.
//!
//! [`Notifier::publish`] never waits: it serializes the event and offers it
//! to a bounded queue. When the queue is full the event is dropped with a
//! warning. A single [`Outbox`] task drains the queue onto a [`MessageBus`],
//! logging and discarding bus failures.

use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::bus::MessageBus;

/// Queue depth used by the server.
pub const DEFAULT_CAPACITY: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
  pub channel: String,
  pub payload: String,
}

/// What happened to an event handed to [`Notifier::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
  Queued,
  /// The queue was full.
  Dropped,
  /// The outbox has shut down.
  Closed,
  /// The event could not be serialized.
  Rejected,
}

/// Cloneable publishing handle.
#[derive(Debug, Clone)]
pub struct Notifier {
  tx: mpsc::Sender<Message>,
}

/// The receiving half of a [`Notifier`] queue.
#[derive(Debug)]
pub struct Outbox {
  rx: mpsc::Receiver<Message>,
}

impl Notifier {
  /// A publishing handle and its outbox. `capacity` is clamped to at least
  /// one.
  pub fn new(capacity: usize) -> (Self, Outbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self { tx }, Outbox { rx })
  }

  pub fn publish<T: Serialize>(&self, channel: &str, event: &T) -> Enqueued {
    let payload = match serde_json::to_string(event) {
      Ok(p) => p,
      Err(e) => {
        tracing::error!(channel, error = %e, "failed to serialize event");
        return Enqueued::Rejected;
      }
    };
    let message = Message { channel: channel.to_owned(), payload };
    match self.tx.try_send(message) {
      Ok(()) => Enqueued::Queued,
      Err(mpsc::error::TrySendError::Full(m)) => {
        tracing::warn!(channel = %m.channel, "event queue full; dropping event");
        Enqueued::Dropped
      }
      Err(mpsc::error::TrySendError::Closed(m)) => {
        tracing::warn!(channel = %m.channel, "event outbox closed; dropping event");
        Enqueued::Closed
      }
    }
  }
}

impl Outbox {
  /// Forward queued messages to `bus` until every [`Notifier`] is dropped.
  pub async fn run<B: MessageBus>(mut self, bus: B) {
    while let Some(message) = self.rx.recv().await {
      tracing::debug!(channel = %message.channel, "forwarding event");
      if let Err(e) = bus.publish(&message.channel, &message.payload).await {
        tracing::error!(
          channel = %message.channel,
          error = %e,
          "failed to publish event"
        );
      }
    }
    tracing::debug!("event outbox drained");
  }

  pub fn spawn<B: MessageBus>(self, bus: B) -> JoinHandle<()> {
    tokio::spawn(self.run(bus))
  }

  /// Take every message currently queued without waiting.
  pub fn try_drain(&mut self) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(m) = self.rx.try_recv() {
      out.push(m);
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bus::MemoryBus;

  #[test]
  fn full_queue_drops_instead_of_blocking() {
    let (notifier, mut outbox) = Notifier::new(1);
    assert_eq!(notifier.publish("c", &1), Enqueued::Queued);
    assert_eq!(notifier.publish("c", &2), Enqueued::Dropped);

    let drained = outbox.try_drain();
    assert_eq!(drained, vec![Message { channel: "c".into(), payload: "1".into() }]);
    assert_eq!(notifier.publish("c", &3), Enqueued::Queued);
  }

  #[test]
  fn closed_outbox_is_reported() {
    let (notifier, outbox) = Notifier::new(1);
    drop(outbox);
    assert_eq!(notifier.publish("c", &1), Enqueued::Closed);
  }

  #[tokio::test]
  async fn outbox_forwards_until_senders_drop() {
    let bus = MemoryBus::new();
    let (notifier, outbox) = Notifier::new(4);
    notifier.publish("incidents", &serde_json::json!({ "a": 1 }));
    notifier.publish("incidents", &serde_json::json!({ "a": 2 }));
    drop(notifier);

    outbox.run(bus.clone()).await;

    let got = bus.messages();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0], ("incidents".into(), r#"{"a":1}"#.into()));
  }

  #[tokio::test]
  async fn bus_failures_are_swallowed() {
    let bus = MemoryBus::new();
    bus.set_failing(true);
    let (notifier, outbox) = Notifier::new(2);
    notifier.publish("incidents", &"lost");
    drop(notifier);

    outbox.run(bus.clone()).await;
    assert!(bus.messages().is_empty());
  }
}
