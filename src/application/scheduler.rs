use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::AccountService;

/// Background task crediting savings interest on a fixed interval.
///
/// Each run goes through the service like any other caller, so it is
/// serialized with user operations. Runs never overlap: the next tick is only
/// awaited once the current batch has finished, and missed ticks are skipped.
pub struct InterestScheduler {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    runs: Arc<AtomicU64>,
}

impl InterestScheduler {
    /// Spawn the task. The first batch runs immediately.
    pub fn start(service: Arc<AccountService>, every: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let runs = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&runs);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(?every, "auto interest enabled");

            loop {
                tokio::select! {
                    biased;
                    _ = stop.changed() => break,
                    _ = ticker.tick() => {}
                }

                match service.apply_interest_to_savings_accounts().await {
                    Ok(report) => debug!(
                        credited = report.credited.len(),
                        failed = report.failed.len(),
                        "scheduled interest run finished"
                    ),
                    Err(err) => error!(error = %err, "scheduled interest run failed"),
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }

            info!("auto interest disabled");
        });

        Self {
            shutdown,
            handle: Some(handle),
            runs,
        }
    }

    /// Number of completed batches.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the task and wait for it to finish its current batch.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!(error = %err, "interest task ended abnormally");
            }
        }
    }
}

impl Drop for InterestScheduler {
    fn drop(&mut self) {
        // The task notices on its next select and exits after any in-flight batch.
        let _ = self.shutdown.send(true);
    }
}
