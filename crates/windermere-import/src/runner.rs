//! The per-tenant import worker.
//!
//! One runner per tenant, driven by a short tick. Most ticks do nothing;
//! when a full or incremental import is due it runs under a per-tick
//! cancellation token so that quitting the runner interrupts any in-flight
//! network work. Reconfiguring an import means quitting the runner and
//! starting a new one.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::client::Ss12000Client;
use crate::error::ImportError;
use crate::full::full_import;
use crate::history::ImportHistory;
use crate::incremental::incremental_import;
use crate::reconcile::ReconcileBackend;

/// How often a runner wakes up to check whether an import is due.
const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Everything a runner needs to do its job for one tenant.
#[derive(Clone)]
pub struct RunnerConfig {
    pub tenant: String,
    pub backend: ReconcileBackend,
    pub client: Arc<Ss12000Client>,
    pub history: Arc<dyn ImportHistory>,
    pub full_import_frequency: Duration,
    pub full_import_retry_wait: Duration,
    pub incremental_import_frequency: Duration,
    pub incremental_import_retry_wait: Duration,
}

/// Handle to a running per-tenant import worker.
pub struct ImportRunner {
    quit_tx: mpsc::Sender<oneshot::Sender<()>>,
    tick_token: Arc<Mutex<Option<CancellationToken>>>,
}

impl ImportRunner {
    /// Create and start a runner for the given configuration.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        let (quit_tx, quit_rx) = mpsc::channel(1);
        let tick_token = Arc::new(Mutex::new(None));
        tokio::spawn(run(config, quit_rx, Arc::clone(&tick_token)));
        Self {
            quit_tx,
            tick_token,
        }
    }

    /// Stop the runner, cancelling any in-flight tick first.
    ///
    /// Returns once the runner has acknowledged; a runner that has already
    /// stopped on its own (after a panic) acknowledges implicitly by
    /// having dropped its end of the quit channel.
    pub async fn quit(&self) {
        let token = self.tick_token.lock().unwrap().clone();
        if let Some(token) = token {
            token.cancel();
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.quit_tx.send(ack_tx).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// An import is due when the time since the last completion exceeds the
/// frequency, unless a failed attempt is in flight and younger than the
/// retry wait.
fn import_due(
    now: DateTime<Utc>,
    started: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
    frequency: Duration,
    retry_wait: Duration,
) -> bool {
    let failed_attempt_in_flight = match (started, completed) {
        (Some(started), Some(completed)) => completed < started,
        (Some(_), None) => true,
        _ => false,
    };
    if failed_attempt_in_flight {
        let started = started.expect("in-flight attempt has a start time");
        if now.signed_duration_since(started).to_std().unwrap_or_default() < retry_wait {
            return false;
        }
    }
    match completed {
        None => true,
        Some(completed) => {
            now.signed_duration_since(completed)
                .to_std()
                .unwrap_or_default()
                > frequency
        }
    }
}

async fn time_for_full_import(config: &RunnerConfig) -> Result<bool, ImportError> {
    let started = config.history.last_started_full().await?;
    let completed = config.history.last_completed_full().await?;
    Ok(import_due(
        Utc::now(),
        started,
        completed,
        config.full_import_frequency,
        config.full_import_retry_wait,
    ))
}

async fn time_for_incremental_import(config: &RunnerConfig) -> Result<bool, ImportError> {
    // A due full import always takes precedence.
    if time_for_full_import(config).await? {
        return Ok(false);
    }
    let started = config.history.last_started_incremental().await?;
    let completed = config.history.last_completed_incremental().await?;
    Ok(import_due(
        Utc::now(),
        started,
        completed,
        config.incremental_import_frequency,
        config.incremental_import_retry_wait,
    ))
}

/// One tick: decide whether an import is due and run it.
///
/// Failures only get logged; a started-but-not-completed history entry is
/// what gates the retry.
async fn import_tick(config: &RunnerConfig, token: &CancellationToken) {
    let tenant = config.tenant.as_str();

    match time_for_full_import(config).await {
        Err(err) => {
            warn!(tenant, %err, "failed to determine whether a full import is due");
            return;
        }
        Ok(true) => {
            if let Err(err) = config.history.set_last_started_full(Utc::now()).await {
                warn!(tenant, %err, "failed to set time of last started full import");
                return;
            }
            match full_import(
                token,
                tenant,
                &config.client,
                &config.backend,
                config.history.as_ref(),
            )
            .await
            {
                Ok(()) => {
                    if let Err(err) = config.history.set_last_completed_full(Utc::now()).await {
                        warn!(tenant, %err, "failed to set time of last completed full import");
                    }
                }
                Err(err) => warn!(tenant, %err, "full import failed"),
            }
            return;
        }
        Ok(false) => {}
    }

    match time_for_incremental_import(config).await {
        Err(err) => {
            warn!(tenant, %err, "failed to determine whether an incremental import is due");
        }
        Ok(true) => {
            if let Err(err) = config.history.set_last_started_incremental(Utc::now()).await {
                warn!(tenant, %err, "failed to set time of last started incremental import");
                return;
            }
            match incremental_import(
                token,
                tenant,
                &config.client,
                &config.backend,
                config.history.as_ref(),
            )
            .await
            {
                Ok(()) => {
                    if let Err(err) = config
                        .history
                        .set_last_completed_incremental(Utc::now())
                        .await
                    {
                        warn!(tenant, %err, "failed to set time of last completed incremental import");
                    }
                }
                Err(err) => warn!(tenant, %err, "incremental import failed"),
            }
        }
        Ok(false) => {}
    }
}

async fn run(
    config: RunnerConfig,
    mut quit_rx: mpsc::Receiver<oneshot::Sender<()>>,
    tick_token: Arc<Mutex<Option<CancellationToken>>>,
) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        // The select below picks randomly among ready branches; give a
        // pending quit priority over the timer with an extra non-blocking
        // check first.
        if let Ok(ack) = quit_rx.try_recv() {
            let _ = ack.send(());
            return;
        }

        tokio::select! {
            biased;
            ack = quit_rx.recv() => {
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
                return;
            }
            _ = ticker.tick() => {
                let token = CancellationToken::new();
                *tick_token.lock().unwrap() = Some(token.clone());
                let outcome = AssertUnwindSafe(import_tick(&config, &token))
                    .catch_unwind()
                    .await;
                *tick_token.lock().unwrap() = None;

                if outcome.is_err() {
                    // A panic in a tick stops this runner but must never
                    // take the process down.
                    error!(tenant = config.tenant, "unexpected panic in import runner, stopping");
                    if let Ok(ack) = quit_rx.try_recv() {
                        let _ = ack.send(());
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    const FREQUENCY: Duration = Duration::from_secs(600); // 10 minutes
    const RETRY_WAIT: Duration = Duration::from_secs(120); // 2 minutes

    #[test]
    fn due_when_never_run() {
        assert!(import_due(at(0), None, None, FREQUENCY, RETRY_WAIT));
    }

    #[test]
    fn not_due_before_frequency_elapsed() {
        assert!(!import_due(
            at(9),
            Some(at(0)),
            Some(at(1)),
            FREQUENCY,
            RETRY_WAIT
        ));
        assert!(import_due(
            at(12),
            Some(at(0)),
            Some(at(1)),
            FREQUENCY,
            RETRY_WAIT
        ));
    }

    #[test]
    fn failed_attempt_gates_on_retry_wait() {
        // Started at 12:10, never completed: due again only at 12:12.
        assert!(!import_due(
            at(11),
            Some(at(10)),
            None,
            FREQUENCY,
            RETRY_WAIT
        ));
        assert!(import_due(
            at(13),
            Some(at(10)),
            None,
            FREQUENCY,
            RETRY_WAIT
        ));
    }

    #[test]
    fn failed_retry_also_waits_when_a_completion_exists() {
        // Completed at 12:00 long ago, retry started at 12:30 and failed.
        let completed = Some(at(0));
        let started = Some(at(30));
        assert!(!import_due(at(31), started, completed, FREQUENCY, RETRY_WAIT));
        assert!(import_due(at(33), started, completed, FREQUENCY, RETRY_WAIT));
    }

    #[test]
    fn successful_run_resets_the_gate() {
        // started < completed means the last attempt succeeded.
        assert!(!import_due(
            at(5),
            Some(at(0)),
            Some(at(2)),
            FREQUENCY,
            RETRY_WAIT
        ));
        assert!(import_due(
            at(15),
            Some(at(0)),
            Some(at(2)),
            FREQUENCY,
            RETRY_WAIT
        ));
    }
}
