use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use crate::{
    database::ImageStore,
    errors::{AppError, Result},
    models::ImageStatus,
    services::MetricsService,
    storage::{remove_all, Storage},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub purged: usize,
    pub failed: usize,
}

/// Reaps records an interrupted upload or delete left behind.
///
/// Pending rows older than the grace period are dropped. Tombstoned rows get
/// another attempt at removing their assets and are purged once that works;
/// rows whose removal fails stay put for the next sweep.
pub struct Reconciler {
    images: Arc<dyn ImageStore>,
    storage: Arc<dyn Storage>,
    metrics: Arc<MetricsService>,
    grace: Duration,
    storage_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        images: Arc<dyn ImageStore>,
        storage: Arc<dyn Storage>,
        metrics: Arc<MetricsService>,
        grace: Duration,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            images,
            storage,
            metrics,
            grace,
            storage_timeout,
        }
    }

    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let grace = chrono::Duration::from_std(self.grace)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid grace period: {}", e)))?;
        let stale = self.images.stale(now - grace).await?;

        let mut report = SweepReport {
            examined: stale.len(),
            ..SweepReport::default()
        };

        for record in stale {
            if let Some(assets) = &record.assets {
                let removed =
                    remove_all(self.storage.as_ref(), &assets.storage_ids(), self.storage_timeout).await;
                if removed.is_err() {
                    report.failed += 1;
                    self.metrics.record_reconciled("failed");
                    continue;
                }
            }

            match self.images.purge(record.id).await {
                Ok(true) => {
                    report.purged += 1;
                    self.metrics.record_reconciled(match record.status {
                        ImageStatus::Pending => "pending_purged",
                        _ => "tombstone_purged",
                    });
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(image_id = %record.id, error = %e, "reconciler could not purge row");
                    report.failed += 1;
                    self.metrics.record_reconciled("failed");
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                purged = report.purged,
                failed = report.failed,
                "reconciler sweep finished"
            );
        }

        Ok(report)
    }

    /// Sweeps every `period` until the runtime shuts down.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_once(Utc::now()).await {
                    tracing::error!(error = %e, "reconciler sweep failed");
                }
            }
        })
    }
}
