use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::WardenConfig;
use crate::error::WardenError;
use crate::report::WardenReport;
use crate::warden::LedgerWarden;

/// Reports published after each audit round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditRound {
    /// 1-based round counter; 0 before the first round completes.
    pub round: u64,
    pub reports: Vec<WardenReport>,
}

/// Handle to a background task auditing on a fixed interval.
///
/// Dropping the handle without [`WardenSchedule::shutdown`] also stops the
/// task at its next wake-up.
pub struct WardenSchedule {
    rounds: watch::Receiver<AuditRound>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WardenSchedule {
    /// Start auditing. Must be called within a tokio runtime.
    pub fn spawn(warden: Arc<LedgerWarden>, config: WardenConfig) -> Result<Self, WardenError> {
        config.validate()?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (rounds_tx, rounds) = watch::channel(AuditRound::default());

        let task = tokio::spawn(async move {
            info!(interval_ms = config.interval_ms, "warden schedule started");
            let mut tick = interval(config.interval());
            let mut round = 0u64;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        round += 1;
                        let warden = Arc::clone(&warden);
                        let selection = config.ledgers.clone();
                        // Audits hash every stored entry; keep them off the async workers.
                        let outcome = tokio::task::spawn_blocking(move || {
                            warden.validate_selected(selection.as_deref())
                        })
                        .await;

                        match outcome {
                            Ok(Ok(reports)) => {
                                let flagged = reports.iter().filter(|r| !r.is_ok()).count();
                                if flagged > 0 {
                                    warn!(round, ledgers = reports.len(), flagged, "audit round found problems");
                                } else {
                                    info!(round, ledgers = reports.len(), "audit round clean");
                                }
                                rounds_tx.send_replace(AuditRound { round, reports });
                            }
                            Ok(Err(e)) => error!(round, error = %e, "audit round failed"),
                            Err(e) => error!(round, error = %e, "audit task panicked"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("warden schedule shutting down");
                        break;
                    }
                }
            }

            info!(rounds = round, "warden schedule stopped");
        });

        Ok(Self {
            rounds,
            shutdown_tx,
            task,
        })
    }

    /// Subscribe to completed rounds.
    pub fn rounds(&self) -> watch::Receiver<AuditRound> {
        self.rounds.clone()
    }

    /// The most recently completed round.
    pub fn latest(&self) -> AuditRound {
        self.rounds.borrow().clone()
    }

    /// Signal the task to stop and wait for it.
    pub async fn shutdown(self) -> Result<(), WardenError> {
        // A send error means the task already exited.
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| WardenError::Task(e.to_string()))
    }
}
