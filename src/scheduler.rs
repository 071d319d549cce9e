//! Polling Scheduler
//!
//! Session-scoped: started on connect, torn down with the session. Owns one
//! bootstrap task and two periodic timers:
//!
//! - presale timer: re-reads presale status (and end time once started) and
//!   stops itself once the presale has ended
//! - supply timer: re-reads tokens minted for the lifetime of the session
//!
//! Timer ticks swallow read failures so one bad tick never stops a timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::sync::{SaleSync, FACT_PRESALE_STATUS, FACT_TOKENS_MINTED};
use crate::types::SaleFacts;

/// Whether a periodic timer keeps running after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

/// One presale timer tick
pub async fn presale_tick(sync: &SaleSync) -> TimerControl {
    sync.metrics().polls_total.inc();
    match sync.refresh_presale_status().await {
        Ok(status) if status.ended => {
            info!(end_time = ?status.end_time, "Presale ended, public sale is live");
            TimerControl::Stop
        }
        Ok(_) => TimerControl::Continue,
        Err(e) => {
            sync.record_read_failure(FACT_PRESALE_STATUS, &e).await;
            TimerControl::Continue
        }
    }
}

/// One supply timer tick
pub async fn supply_tick(sync: &SaleSync) {
    sync.metrics().polls_total.inc();
    if let Err(e) = sync.refresh_tokens_minted().await {
        sync.record_read_failure(FACT_TOKENS_MINTED, &e).await;
    }
}

pub struct PollingScheduler {
    sync: Arc<SaleSync>,
    shutdown_tx: watch::Sender<bool>,
    bootstrap: Option<JoinHandle<SaleFacts>>,
    presale_timer: JoinHandle<()>,
    supply_timer: JoinHandle<()>,
}

impl PollingScheduler {
    /// Spawn the bootstrap task and both timers.
    ///
    /// The first timer tick fires one `interval` after start.
    pub fn start(sync: Arc<SaleSync>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let bootstrap = {
            let sync = sync.clone();
            Some(tokio::spawn(async move { sync.bootstrap().await }))
        };

        let presale_timer = tokio::spawn(run_presale_timer(
            sync.clone(),
            interval,
            shutdown_rx.clone(),
        ));
        let supply_timer = tokio::spawn(run_supply_timer(sync.clone(), interval, shutdown_rx));

        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        info!(interval_ms, "Polling scheduler started");

        Self {
            sync,
            shutdown_tx,
            bootstrap,
            presale_timer,
            supply_timer,
        }
    }

    pub fn bootstrap_finished(&self) -> bool {
        self.bootstrap.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn presale_timer_finished(&self) -> bool {
        self.presale_timer.is_finished()
    }

    pub fn supply_timer_finished(&self) -> bool {
        self.supply_timer.is_finished()
    }

    /// Wait for the bootstrap sequence and return the facts it produced.
    /// Returns `None` if it was already awaited or did not complete.
    pub async fn wait_bootstrap(&mut self) -> Option<SaleFacts> {
        self.bootstrap.take()?.await.ok()
    }

    /// Stop both timers and the bootstrap and wait for them to unwind.
    ///
    /// Tasks are aborted rather than drained, so a tick stuck on a network
    /// read cannot hold up teardown.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(bootstrap) = self.bootstrap.take() {
            bootstrap.abort();
            let _ = bootstrap.await;
        }

        self.presale_timer.abort();
        self.supply_timer.abort();
        let _ = (&mut self.presale_timer).await;
        let _ = (&mut self.supply_timer).await;

        self.sync.metrics().presale_timer_active.set(0);
        info!("Polling scheduler stopped");
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Some(bootstrap) = &self.bootstrap {
            bootstrap.abort();
        }
        self.presale_timer.abort();
        self.supply_timer.abort();
        self.sync.metrics().presale_timer_active.set(0);
    }
}

async fn run_presale_timer(
    sync: Arc<SaleSync>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    sync.metrics().presale_timer_active.set(1);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Presale timer shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                if presale_tick(&sync).await == TimerControl::Stop {
                    break;
                }
            }
        }
    }

    sync.metrics().presale_timer_active.set(0);
}

async fn run_supply_timer(
    sync: Arc<SaleSync>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Supply timer shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                supply_tick(&sync).await;
            }
        }
    }
}
