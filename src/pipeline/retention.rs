use chrono::{DateTime, TimeDelta, Utc};

use crate::config::RetentionConfig;
use crate::db::Repository;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub deleted_by_age: usize,
    pub deleted_by_count: usize,
    /// Non-deleted articles left after both phases.
    pub remaining: i64,
    pub purged_soft_deleted: usize,
    pub logs_deleted: usize,
    pub metrics_deleted: usize,
    /// Set when the age phase stopped early; the count phase still ran.
    pub age_phase_error: Option<String>,
}

/// Bounds the article store by age, then by count.
pub struct RetentionManager<'a> {
    repo: &'a Repository,
    config: &'a RetentionConfig,
}

impl<'a> RetentionManager<'a> {
    pub fn new(repo: &'a Repository, config: &'a RetentionConfig) -> Self {
        Self { repo, config }
    }

    pub async fn enforce_retention(&self) -> Result<RetentionReport> {
        self.enforce_retention_at(Utc::now()).await
    }

    /// Runs both phases, then the auxiliary purges. A phase-2 failure is
    /// returned only after the auxiliary purges have run.
    pub async fn enforce_retention_at(&self, now: DateTime<Utc>) -> Result<RetentionReport> {
        let cutoff = days_before(now, self.config.max_article_age_days)?;
        let log_cutoff = days_before(now, self.config.log_retention_days)?;
        let metrics_cutoff = days_before(now, self.config.metrics_retention_days)?;
        let mut report = RetentionReport::default();

        tracing::info!(
            "Enforcing retention: max age {} days, max {} articles",
            self.config.max_article_age_days,
            self.config.max_articles_count
        );

        if let Err(e) = self.purge_by_age(cutoff, &mut report.deleted_by_age).await {
            tracing::error!("Age-based purge failed: {}", e);
            report.age_phase_error = Some(e.to_string());
        }

        let count_phase = self.enforce_count_limit(&mut report).await;
        if let Err(e) = &count_phase {
            tracing::error!("Count-based purge failed: {}", e);
        }

        report.purged_soft_deleted = non_fatal(
            "soft-deleted articles",
            self.repo.purge_soft_deleted_before(cutoff).await,
        );
        report.logs_deleted = non_fatal(
            "fetch logs",
            self.repo.purge_fetch_logs_before(log_cutoff).await,
        );
        report.metrics_deleted = non_fatal(
            "storage metrics",
            self.repo.purge_storage_metrics_before(metrics_cutoff).await,
        );
        count_phase?;

        tracing::info!(
            "Retention complete: {} deleted by age, {} deleted by count, {} remaining, {} soft-deleted purged, {} logs and {} metrics removed",
            report.deleted_by_age,
            report.deleted_by_count,
            report.remaining,
            report.purged_soft_deleted,
            report.logs_deleted,
            report.metrics_deleted
        );

        Ok(report)
    }

    /// Deletes expired articles batch by batch. `deleted` is kept current so a
    /// failure part way through still reports what was removed.
    async fn purge_by_age(&self, cutoff: DateTime<Utc>, deleted: &mut usize) -> Result<()> {
        let initial = self.repo.count_expired_articles(cutoff).await?;
        if initial == 0 {
            return Ok(());
        }

        let batch_size = self.config.purge_batch_size.max(1);
        let max_batches = (initial as usize).div_ceil(batch_size) + 1;
        tracing::info!("Found {} articles older than {}", initial, cutoff.to_rfc3339());

        for _ in 0..max_batches {
            let ids = self.repo.expired_article_ids(cutoff, batch_size).await?;
            if ids.is_empty() {
                break;
            }
            *deleted += self.repo.delete_articles(ids).await?;
        }

        Ok(())
    }

    /// Deletes exactly the excess over the count limit, oldest first.
    async fn enforce_count_limit(&self, report: &mut RetentionReport) -> Result<()> {
        let count = self.repo.count_active_articles().await?.max(0) as usize;
        let limit = self.config.max_articles_count;

        if count > limit {
            let excess = count - limit;
            tracing::info!("{} articles over the limit of {}", excess, limit);

            let ids = self.repo.oldest_article_ids(excess).await?;
            for chunk in ids.chunks(self.config.purge_batch_size.max(1)) {
                report.deleted_by_count += self.repo.delete_articles(chunk.to_vec()).await?;
            }
        }

        report.remaining = self.repo.count_active_articles().await?;
        Ok(())
    }
}

/// `now` minus `days`, or a config error when the window cannot be represented.
fn days_before(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    TimeDelta::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| AppError::Config(format!("retention window of {days} days is out of range")))
}

fn non_fatal(what: &str, result: Result<usize>) -> usize {
    result.unwrap_or_else(|e| {
        tracing::warn!("Failed to purge old {}: {}", what, e);
        0
    })
}
