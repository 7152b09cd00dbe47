//! Refresh lifecycle: startup refresh, periodic timer, manual triggers,
//! and config-driven re-arming.
//!
//! All refresh cycles run inline in one spawned task, so two cycles can
//! never interleave their store writes. Manual triggers arriving while a
//! cycle is in flight collapse into at most one queued follow-up cycle.

use crate::config::Config;
use crate::feed::FetchedFeed;
use crate::store::FeedStore;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Batch fetch seam: the scheduler hands it the source URLs and gets one
/// result per URL back. Injected so the refresh machinery is testable
/// without a network.
pub type FetchFn =
    Arc<dyn Fn(Vec<String>) -> BoxFuture<'static, Vec<FetchedFeed>> + Send + Sync>;

pub struct RefresherHandle {
    trigger_tx: mpsc::Sender<()>,
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl RefresherHandle {
    /// Request a refresh. Idempotent while a cycle is in flight: extra
    /// requests collapse into the single queued follow-up.
    pub fn trigger(&self) {
        // Capacity-1 channel: a full buffer already means "refresh soon"
        let _ = self.trigger_tx.try_send(());
    }

    /// Stop the periodic task. In-flight fetches are dropped with it.
    pub async fn stop(self) {
        let _ = self.cancel_tx.send(());
        let _ = self.join.await;
    }
}

/// Spawn the refresher task. Runs one refresh immediately on startup,
/// then waits on the timer, manual triggers, and config changes.
pub fn spawn(
    store: Arc<Mutex<FeedStore>>,
    fetch: FetchFn,
    config_rx: watch::Receiver<Config>,
) -> RefresherHandle {
    let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);

    let mut config_rx_task = config_rx;
    let join = tokio::spawn(async move {
        let mut ticker = make_ticker(config_rx_task.borrow().refresh_interval_minutes);

        run_cycle(&store, &fetch, &config_rx_task).await;

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    tracing::debug!("Refresher shutdown requested");
                    break;
                }
                changed = config_rx_task.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Config channel closed, stopping refresher");
                        break;
                    }
                    // Re-arm with the new interval; the old ticker is
                    // dropped so timers never stack.
                    let minutes = config_rx_task.borrow().refresh_interval_minutes;
                    tracing::info!(interval_minutes = minutes, "Refresh interval changed, re-arming timer");
                    ticker = make_ticker(minutes);
                }
                _ = trigger_rx.recv() => {
                    run_cycle(&store, &fetch, &config_rx_task).await;
                }
                _ = tick(&mut ticker) => {
                    run_cycle(&store, &fetch, &config_rx_task).await;
                }
            }
        }
    });

    RefresherHandle {
        trigger_tx,
        cancel_tx,
        join,
    }
}

/// Widest period the timer will accept; tokio's deadline arithmetic
/// overflows far below `u64::MAX` seconds.
const MAX_TICK_SECS: u64 = 60 * 60 * 24 * 365;

/// Interval 0 means manual refresh only.
fn make_ticker(interval_minutes: u64) -> Option<Interval> {
    if interval_minutes == 0 {
        return None;
    }
    let secs = interval_minutes.saturating_mul(60).min(MAX_TICK_SECS);
    let mut ticker = interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The immediate first tick is redundant with the startup refresh
    ticker.reset();
    Some(ticker)
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => futures::future::pending::<()>().await,
    }
}

/// One complete refresh cycle: fetch every source (no store lock held),
/// then merge the whole batch into the store atomically. Feed-level
/// errors are already folded into the batch and never fail the cycle.
async fn run_cycle(
    store: &Arc<Mutex<FeedStore>>,
    fetch: &FetchFn,
    config_rx: &watch::Receiver<Config>,
) {
    let (sources, items_limit) = {
        let config = config_rx.borrow();
        (config.sources.clone(), config.items_limit)
    };

    tracing::debug!(sources = sources.len(), "Refresh cycle started");
    let fetched = fetch(sources).await;

    let failed = fetched.iter().filter(|f| f.error.is_some()).count();
    let total = fetched.len();

    store.lock().await.apply_refresh(fetched, items_limit);
    tracing::info!(total = total, failed = failed, "Refresh cycle complete");
}
