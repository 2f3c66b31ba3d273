// Payout scheduler
//
// Daily (default): runs once per day at a configured UTC hour, off-peak, so
// a member's day of tips settles as one transfer.
// Hourly: for high-volume properties where balances cross the payout floor
// several times a day.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::info;

use super::batcher::PayoutBatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutFrequency {
    Daily,
    Hourly,
}

#[derive(Debug, Clone)]
pub struct PayoutScheduleConfig {
    pub frequency: PayoutFrequency,
    /// UTC hour for the daily run (0-23)
    pub execution_hour: u32,
}

/// Drives the batcher on a fixed cadence. One tick at a time by
/// construction; the operator surface can still trigger runs in between,
/// which the claim step makes safe.
pub struct PayoutScheduler {
    config: PayoutScheduleConfig,
    batcher: Arc<PayoutBatcher>,
}

impl PayoutScheduler {
    pub fn new(config: PayoutScheduleConfig, batcher: Arc<PayoutBatcher>) -> Self {
        Self { config, batcher }
    }

    /// Start the scheduler (runs in background)
    pub fn start(&self) -> JoinHandle<()> {
        let config = self.config.clone();
        let batcher = self.batcher.clone();

        tokio::spawn(async move {
            match config.frequency {
                PayoutFrequency::Daily => Self::run_daily(&config, &batcher).await,
                PayoutFrequency::Hourly => Self::run_hourly(&batcher).await,
            }
        })
    }

    async fn run_daily(config: &PayoutScheduleConfig, batcher: &Arc<PayoutBatcher>) {
        loop {
            let now = Utc::now();
            let next_execution = Self::calculate_next_daily_execution(now, config.execution_hour);
            let duration_until_execution = next_execution.signed_duration_since(now);

            if duration_until_execution.num_seconds() > 0 {
                info!(
                    "Next payout run scheduled for {} UTC",
                    next_execution.format("%Y-%m-%d %H:%M:%S")
                );

                tokio::time::sleep(Duration::from_secs(
                    duration_until_execution.num_seconds() as u64,
                ))
                .await;
            }

            info!("Starting scheduled payout run");
            let summary = batcher.process_payouts().await;
            info!(
                "Scheduled payout run done: {} processed, {} failed, {} skipped",
                summary.processed, summary.failed, summary.skipped
            );
        }
    }

    async fn run_hourly(batcher: &Arc<PayoutBatcher>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;

            info!("Starting hourly payout run");
            let summary = batcher.process_payouts().await;
            info!(
                "Hourly payout run done: {} processed, {} failed, {} skipped",
                summary.processed, summary.failed, summary.skipped
            );
        }
    }

    /// Calculate next daily execution time
    fn calculate_next_daily_execution(now: DateTime<Utc>, execution_hour: u32) -> DateTime<Utc> {
        let mut next = now
            .date_naive()
            .and_hms_opt(execution_hour, 0, 0)
            .unwrap();
        let next_dt = Utc.from_utc_datetime(&next);

        // If execution time has passed today, schedule for tomorrow
        if next_dt <= now {
            next = (now.date_naive() + chrono::Duration::days(1))
                .and_hms_opt(execution_hour, 0, 0)
                .unwrap();
            Utc.from_utc_datetime(&next)
        } else {
            next_dt
        }
    }
}
