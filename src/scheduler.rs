//! Profit accrual scheduler.
//!
//! Two timers drive the same procedure: a coarse one firing once per profit cycle and a fine
//! safety net that picks up investments which became due in between (after downtime, for
//! instance). Overlapping runs are harmless because each accrual is a compare-and-swap.

use crate::{config::SchedulerSettings, core::accrual::distribute_profits, errors::Result};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const MIN_PERIOD: Duration = Duration::from_secs(1);
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

/// Handle to the running accrual timers.
///
/// Dropping the handle does not stop the timers; call [`ProfitScheduler::shutdown`].
pub struct ProfitScheduler {
    db: Arc<DatabaseConnection>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ProfitScheduler {
    /// Spawns both timers. The safety net runs once immediately.
    #[must_use]
    pub fn start(db: Arc<DatabaseConnection>, settings: &SchedulerSettings) -> Self {
        let shutdown = CancellationToken::new();
        let coarse = settings.accrual_interval().clamp(MIN_PERIOD, MAX_PERIOD);
        let fine = settings.safety_net_interval().clamp(MIN_PERIOD, MAX_PERIOD);

        let tasks = vec![
            spawn_timer("accrual", Arc::clone(&db), Instant::now() + coarse, coarse, shutdown.clone()),
            spawn_timer("safety_net", Arc::clone(&db), Instant::now(), fine, shutdown.clone()),
        ];
        info!(
            accrual_interval_secs = coarse.as_secs(),
            safety_net_interval_secs = fine.as_secs(),
            "profit scheduler started"
        );

        Self {
            db,
            shutdown,
            tasks,
        }
    }

    /// Runs the accrual procedure now, outside the timers.
    pub async fn run_once(&self) -> Result<usize> {
        distribute_profits(&self.db, Utc::now()).await
    }

    /// Stops issuing new runs and waits for an in-flight run to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "scheduler task panicked");
            }
        }
        info!("profit scheduler stopped");
    }
}

fn spawn_timer(
    name: &'static str,
    db: Arc<DatabaseConnection>,
    start: Instant,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!(timer = name, "shutdown requested, timer exiting");
                    return;
                }
                _ = ticker.tick() => {
                    // Not raced against shutdown, so a started run always completes
                    match distribute_profits(&db, Utc::now()).await {
                        Ok(credited) => debug!(timer = name, credited, "accrual run finished"),
                        Err(e) => error!(timer = name, error = %e, "accrual run failed"),
                    }
                }
            }
        }
    })
}
