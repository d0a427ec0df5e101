//! SQLite implementation of [`IncidentStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use roadwatch_core::store::{IncidentStore, IncidentTx};
use rusqlite::TransactionBehavior;

use crate::{Error, Result, schema::SCHEMA, tx::SqliteTx};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An incident store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection thread, so transactions issued through them run one
/// at a time.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── IncidentStore impl ──────────────────────────────────────────────────────

impl IncidentStore for SqliteStore {
  async fn transact<F, R>(&self, work: F) -> roadwatch_core::Result<R>
  where
    F: FnOnce(&mut dyn IncidentTx) -> roadwatch_core::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let cancelled = Arc::new(AtomicBool::new(false));
    let _abandon = AbandonOnDrop(cancelled.clone());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut outcome = work(&mut SqliteTx::new(&tx));
        if outcome.is_ok() && cancelled.load(Ordering::Acquire) {
          outcome = Err(Error::Cancelled.into());
        }
        match &outcome {
          Ok(_) => tx.commit()?,
          Err(e) => {
            tracing::debug!(error = %e, "rolling back transaction");
            tx.rollback()?;
          }
        }
        Ok(outcome)
      })
      .await
      .map_err(Error::from)?;
    outcome
  }
}

/// Marks the transaction as abandoned when the awaiting future is dropped.
/// The work closure checks the flag before committing and rolls back instead.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
  fn drop(&mut self) { self.0.store(true, Ordering::Release); }
}
