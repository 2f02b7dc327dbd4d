//! Background reclamation of expired sessions.
//!
//! A single Tokio task ticks every `cleanup_interval` and runs a sweep on the
//! blocking pool against its own table handle, so request handlers never
//! wait on it. Each expired row is re-checked and handed to the pre-delete
//! callback with no lock held, then deleted only if it is still expired.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{SessionCodec, short_id};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::table::{SessionRow, SessionTable};

/// Callback invoked with each expired session just before it is deleted.
pub type PreDeleteCallback = Arc<dyn Fn(&Session) + Send + Sync>;

/// Shared slot holding the registered callback, if any.
pub(crate) type CallbackSlot = Arc<RwLock<Option<PreDeleteCallback>>>;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired rows found by the scan.
    pub scanned: usize,
    /// Rows deleted.
    pub reclaimed: usize,
    /// Rows that were gone or no longer expired when re-checked.
    pub skipped: usize,
    /// Rows whose reclaim step hit a storage error.
    pub failed: usize,
    /// Callback invocations that panicked.
    pub callback_panics: usize,
}

/// Lifecycle of the reclaimer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimerState {
    Idle,
    Sweeping,
    Stopped,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sweeper
// ─────────────────────────────────────────────────────────────────────────────

struct Sweeper {
    table: Arc<dyn SessionTable>,
    codec: SessionCodec,
    callback: CallbackSlot,
    cancel: CancellationToken,
    sweeping: AtomicBool,
    stopped: AtomicBool,
}

/// Clears the in-flight flag when a sweep ends, including by panic.
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Sweeper {
    /// Run one sweep. Returns `None` when another sweep is in flight.
    fn sweep(&self) -> Result<Option<SweepReport>> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }
        let _guard = SweepGuard(&self.sweeping);

        let ids = self.table.expired_ids(Utc::now())?;
        let mut report = SweepReport {
            scanned: ids.len(),
            ..Default::default()
        };

        for id in ids {
            if self.cancel.is_cancelled() {
                debug!("Sweep interrupted by shutdown");
                break;
            }

            let callback = self.callback.read().clone();
            let mut panicked = false;
            let outcome = self.table.reclaim(&id, Utc::now(), &mut |row| {
                if let Some(ref callback) = callback {
                    panicked = !self.notify(callback, row);
                }
            });

            if panicked {
                report.callback_panics += 1;
            }
            match outcome {
                Ok(true) => report.reclaimed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(session = %short_id(&id), error = %e, "Failed to reclaim session");
                }
            }
        }

        Ok(Some(report))
    }

    /// Hand a row about to be deleted to the callback. Returns `false` if the
    /// callback panicked.
    fn notify(&self, callback: &PreDeleteCallback, row: &SessionRow) -> bool {
        let values = match self.codec.decode(&row.id, &row.payload) {
            Ok(values) => values,
            Err(e) => {
                debug!(
                    session = %short_id(&row.id),
                    error = %e,
                    "Expired session payload unreadable, deleting without callback"
                );
                return true;
            }
        };

        let session = Session::from_stored(row.id.clone(), values, row.created_at, row.expires_at);
        match catch_unwind(AssertUnwindSafe(|| callback(&session))) {
            Ok(()) => true,
            Err(_) => {
                error!(session = %short_id(&row.id), "Pre-delete callback panicked");
                false
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reclaimer
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to the background reclaimer task.
pub struct Reclaimer {
    sweeper: Arc<Sweeper>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Reclaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reclaimer")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Reclaimer {
    /// Start the periodic task. The first sweep runs one `interval` from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(
        table: Arc<dyn SessionTable>,
        codec: SessionCodec,
        callback: CallbackSlot,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let sweeper = Arc::new(Sweeper {
            table,
            codec,
            callback,
            cancel: cancel.clone(),
            sweeping: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });

        let handle = tokio::spawn(run(Arc::clone(&sweeper), interval, cancel.clone()));
        debug!(interval_secs = interval.as_secs_f64(), "Reclaimer started");

        Self {
            sweeper,
            cancel,
            handle: Some(handle),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReclaimerState {
        if self.sweeper.stopped.load(Ordering::Acquire) {
            ReclaimerState::Stopped
        } else if self.sweeper.sweeping.load(Ordering::Acquire) {
            ReclaimerState::Sweeping
        } else {
            ReclaimerState::Idle
        }
    }

    /// Run one sweep on the calling thread.
    ///
    /// Returns `None` if a sweep is already running or the reclaimer has
    /// been stopped.
    pub fn sweep_now(&self) -> Result<Option<SweepReport>> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        self.sweeper.sweep()
    }

    /// Stop the timer and wait for the task to exit. An in-flight sweep
    /// stops after its current row.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|e| Error::Reclaimer(format!("reclaimer task failed: {}", e)))?;
        }
        self.sweeper.stopped.store(true, Ordering::Release);
        debug!("Reclaimer stopped");
        Ok(())
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(sweeper: Arc<Sweeper>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let worker = Arc::clone(&sweeper);
        match tokio::task::spawn_blocking(move || worker.sweep()).await {
            Ok(Ok(Some(report))) => {
                if report.reclaimed > 0 || report.failed > 0 {
                    info!(
                        reclaimed = report.reclaimed,
                        skipped = report.skipped,
                        failed = report.failed,
                        callback_panics = report.callback_panics,
                        "Session sweep completed"
                    );
                } else {
                    debug!("Session sweep: no expired sessions");
                }
            }
            Ok(Ok(None)) => debug!("Session sweep already running, tick skipped"),
            Ok(Err(e)) => warn!(error = %e, "Session sweep failed"),
            Err(e) => error!(error = %e, "Session sweep task panicked"),
        }
    }

    sweeper.stopped.store(true, Ordering::Release);
}
