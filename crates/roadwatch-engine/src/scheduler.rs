//! Periodic retirement of stale incidents.
//!
//! Each tick runs two sweeps in a single transaction: the inactivity sweep
//! (no interaction within the type's window) followed by the global lifetime
//! sweep (older than the type's maximum age). Each sweep reads the active set
//! afresh, so an incident retired by the first is skipped by the second. A
//! failure on one incident is logged and the sweep moves on.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use roadwatch_core::{
  Result,
  clock::Clock,
  incident::IncidentView,
  policy::{self, RetirementReason},
  store::{IncidentStore, IncidentTx},
};
use tokio::{
  sync::watch,
  task::JoinHandle,
  time::{Instant, MissedTickBehavior},
};

use crate::{
  event::{Action, IncidentMessage},
  notifier::Notifier,
};

/// Incidents retired by one [`Scheduler::tick`].
#[derive(Debug, Default)]
pub struct SweepReport {
  pub inactive: Vec<IncidentView>,
  pub expired:  Vec<IncidentView>,
}

impl SweepReport {
  pub fn is_empty(&self) -> bool { self.inactive.is_empty() && self.expired.is_empty() }
}

pub struct Scheduler<S, C> {
  store:    Arc<S>,
  clock:    C,
  notifier: Notifier,
  channel:  String,
  period:   Duration,
}

impl<S: IncidentStore + 'static, C: Clock> Scheduler<S, C> {
  pub fn new(
    store: Arc<S>,
    clock: C,
    notifier: Notifier,
    channel: impl Into<String>,
    period: Duration,
  ) -> Self {
    Self { store, clock, notifier, channel: channel.into(), period }
  }

  /// Run both sweeps once and publish a `deleted` event per retirement after
  /// the transaction commits.
  pub async fn tick(&self) -> Result<SweepReport> {
    let now = self.clock.now();
    tracing::debug!(%now, "moderation sweep started");
    let report = self
      .store
      .transact(move |tx| {
        Ok(SweepReport {
          inactive: sweep(tx, now, RetirementReason::Inactivity),
          expired:  sweep(tx, now, RetirementReason::GlobalLifetime),
        })
      })
      .await?;

    for view in report.inactive.iter().chain(&report.expired) {
      let message = IncidentMessage::new(Action::Deleted, view);
      self.notifier.publish(&self.channel, &message);
    }
    tracing::debug!(
      inactive = report.inactive.len(),
      expired = report.expired.len(),
      "moderation sweep finished"
    );
    Ok(report)
  }

  /// Tick every period until `shutdown` flips to `true` or its sender is
  /// dropped. The first tick fires one period after start. A tick already in
  /// progress finishes before the loop exits.
  pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(period_secs = self.period.as_secs(), "moderation scheduler started");

    loop {
      tokio::select! {
        _ = interval.tick() => {
          if let Err(e) = self.tick().await {
            tracing::error!(error = %e, "moderation sweep failed");
          }
        }
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            break;
          }
        }
      }
    }
    tracing::info!("moderation scheduler stopped");
  }

  pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(self.run(shutdown))
  }
}

/// Retire every active incident whose `reason` window has elapsed at `now`.
/// An incident that cannot be read or retired is logged and skipped.
fn sweep(
  tx: &mut dyn IncidentTx,
  now: DateTime<Utc>,
  reason: RetirementReason,
) -> Vec<IncidentView> {
  let ids = match tx.active_incident_ids() {
    Ok(ids) => ids,
    Err(e) => {
      tracing::error!(reason = reason.as_str(), error = %e, "failed to list active incidents");
      return Vec::new();
    }
  };

  let mut retired = Vec::new();
  for id in ids {
    let mut view = match tx.get_incident(id) {
      Ok(Some(view)) if view.incident.is_active() => view,
      Ok(_) => continue,
      Err(e) => {
        tracing::warn!(incident_id = %id, error = %e, "skipping unreadable incident");
        continue;
      }
    };

    let due = match reason {
      RetirementReason::Inactivity => policy::inactivity_expired(&view, now),
      RetirementReason::GlobalLifetime => policy::lifetime_expired(&view, now),
      RetirementReason::NegativeReports => false,
    };
    if !due {
      continue;
    }

    match tx.retire_incident(id, now) {
      Ok(true) => {
        tracing::info!(incident_id = %id, reason = reason.as_str(), "incident retired");
        view.incident.deleted_at = Some(now);
        retired.push(view);
      }
      Ok(false) => {
        tracing::debug!(incident_id = %id, "incident already retired");
      }
      Err(e) => {
        tracing::error!(incident_id = %id, error = %e, "failed to retire incident");
      }
    }
  }
  retired
}
