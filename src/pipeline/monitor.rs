use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::StorageConfig;
use crate::db::{Repository, TableCounts};
use crate::error::Result;
use crate::models::{ArticleStats, NewStorageMetric, StorageStatus};

/// Average bytes per row before index overhead, with the row count it applies to.
const ROW_ESTIMATES: [(&str, i64, fn(&TableCounts) -> i64); 4] = [
    ("articles", 5 * 1024, |c| c.articles),
    ("sources", 500, |c| c.sources),
    ("fetch_logs", 200, |c| c.fetch_logs),
    ("storage_metrics", 100, |c| c.storage_metrics),
];

const INDEX_OVERHEAD: f64 = 1.3;

#[derive(Debug, Clone, PartialEq)]
pub struct TableUsage {
    pub table: &'static str,
    pub rows: i64,
    pub estimated_bytes: i64,
}

/// Estimated per-table usage from row counts.
pub fn estimate_usage(counts: &TableCounts) -> Vec<TableUsage> {
    ROW_ESTIMATES
        .iter()
        .map(|&(table, row_bytes, rows_of)| {
            let rows = rows_of(counts);
            TableUsage {
                table,
                rows,
                estimated_bytes: (rows as f64 * row_bytes as f64 * INDEX_OVERHEAD).round() as i64,
            }
        })
        .collect()
}

pub fn storage_status(usage_percent: f64, config: &StorageConfig) -> StorageStatus {
    if usage_percent >= config.critical_percent {
        StorageStatus::Critical
    } else if usage_percent >= config.warning_percent {
        StorageStatus::Warning
    } else {
        StorageStatus::Ok
    }
}

pub fn format_bytes(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.2} KB", b / KB)
    } else if b < KB * KB * KB {
        format!("{:.2} MB", b / (KB * KB))
    } else {
        format!("{:.2} GB", b / (KB * KB * KB))
    }
}

#[derive(Debug, Clone)]
pub struct StorageReport {
    pub tables: Vec<TableUsage>,
    pub total_bytes: i64,
    /// Allocated size of the SQLite file.
    pub database_bytes: i64,
    pub limit_bytes: u64,
    pub usage_percent: f64,
    pub status: StorageStatus,
    pub warning_percent: f64,
    pub critical_percent: f64,
    pub articles: ArticleStats,
    pub measured_at: DateTime<Utc>,
}

impl StorageReport {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

impl fmt::Display for StorageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        let thin = "-".repeat(40);
        let limit = self.limit_bytes as f64;

        writeln!(f, "{rule}")?;
        writeln!(f, "STORAGE MONITORING REPORT")?;
        writeln!(f, "Generated: {}", self.measured_at.to_rfc3339())?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "STATUS: {}", self.status)?;
        writeln!(
            f,
            "USAGE: {:.2}% of {}",
            self.usage_percent,
            format_bytes(self.limit_bytes as i64)
        )?;
        writeln!(f, "ESTIMATED TOTAL: {}", format_bytes(self.total_bytes))?;
        writeln!(f, "DATABASE FILE: {}", format_bytes(self.database_bytes))?;
        writeln!(f)?;
        writeln!(f, "TABLE BREAKDOWN:")?;
        writeln!(f, "{thin}")?;
        for t in &self.tables {
            writeln!(
                f,
                "  {}: {} rows (~{})",
                t.table,
                t.rows,
                format_bytes(t.estimated_bytes)
            )?;
        }
        writeln!(f)?;
        writeln!(f, "ARTICLE STATISTICS:")?;
        writeln!(f, "{thin}")?;
        writeln!(f, "  Total articles: {}", self.articles.total_count)?;
        if let Some(oldest) = self.articles.oldest {
            writeln!(f, "  Oldest: {}", oldest.to_rfc3339())?;
        }
        if let Some(newest) = self.articles.newest {
            writeln!(f, "  Newest: {}", newest.to_rfc3339())?;
        }
        writeln!(f)?;
        writeln!(f, "THRESHOLDS:")?;
        writeln!(f, "{thin}")?;
        writeln!(
            f,
            "  Warning:  {}% ({})",
            self.warning_percent,
            format_bytes((limit * self.warning_percent / 100.0) as i64)
        )?;
        writeln!(
            f,
            "  Critical: {}% ({})",
            self.critical_percent,
            format_bytes((limit * self.critical_percent / 100.0) as i64)
        )?;
        write!(f, "{rule}")
    }
}

pub struct StorageMonitor<'a> {
    repo: &'a Repository,
    config: &'a StorageConfig,
}

impl<'a> StorageMonitor<'a> {
    pub fn new(repo: &'a Repository, config: &'a StorageConfig) -> Self {
        Self { repo, config }
    }

    /// Measures usage and records a snapshot. A failed snapshot write is only logged.
    pub async fn check(&self) -> Result<StorageReport> {
        let measured_at = Utc::now();
        let counts = self.repo.table_counts().await?;
        let tables = estimate_usage(&counts);
        let total_bytes = tables.iter().map(|t| t.estimated_bytes).sum::<i64>();
        let usage_percent = if self.config.limit_bytes == 0 {
            100.0
        } else {
            total_bytes as f64 / self.config.limit_bytes as f64 * 100.0
        };
        let status = storage_status(usage_percent, self.config);

        let articles = self.repo.article_stats().await?;
        let database_bytes = self.repo.database_size_bytes().await?;

        let articles_estimate = tables
            .iter()
            .find(|t| t.table == "articles")
            .map(|t| t.estimated_bytes)
            .unwrap_or(0);
        let metric = NewStorageMetric {
            total_size_bytes: total_bytes,
            articles_count: counts.articles,
            articles_size_bytes: articles_estimate,
        };
        if let Err(e) = self.repo.record_storage_metric(metric, measured_at).await {
            tracing::warn!("Could not record storage metrics: {}", e);
        }

        match status {
            StorageStatus::Critical => tracing::error!(
                "Storage usage CRITICAL: {:.2}% of {}",
                usage_percent,
                format_bytes(self.config.limit_bytes as i64)
            ),
            StorageStatus::Warning => tracing::warn!(
                "Storage usage high: {:.2}% of {}",
                usage_percent,
                format_bytes(self.config.limit_bytes as i64)
            ),
            StorageStatus::Ok => tracing::info!(
                "Storage usage: {:.2}% of {}",
                usage_percent,
                format_bytes(self.config.limit_bytes as i64)
            ),
        }

        Ok(StorageReport {
            tables,
            total_bytes,
            database_bytes,
            limit_bytes: self.config.limit_bytes,
            usage_percent,
            status,
            warning_percent: self.config.warning_percent,
            critical_percent: self.config.critical_percent,
            articles,
            measured_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_apply_row_sizes_and_overhead() {
        let counts = TableCounts {
            articles: 1000,
            sources: 10,
            fetch_logs: 100,
            storage_metrics: 7,
        };
        let usage = estimate_usage(&counts);

        assert_eq!(usage[0].table, "articles");
        assert_eq!(usage[0].estimated_bytes, 6_656_000);
        assert_eq!(usage[1].estimated_bytes, 6_500);
        assert_eq!(usage[2].estimated_bytes, 26_000);
        assert_eq!(usage[3].table, "storage_metrics");
        assert_eq!(usage[3].rows, 7);
        assert_eq!(usage[3].estimated_bytes, 910);
        assert_eq!(
            usage.iter().map(|u| u.rows).collect::<Vec<_>>(),
            vec![1000, 10, 100, 7]
        );
    }

    #[test]
    fn status_thresholds() {
        let config = StorageConfig::default();
        assert_eq!(storage_status(10.0, &config), StorageStatus::Ok);
        assert_eq!(storage_status(79.99, &config), StorageStatus::Ok);
        assert_eq!(storage_status(80.0, &config), StorageStatus::Warning);
        assert_eq!(storage_status(90.0, &config), StorageStatus::Critical);
        assert_eq!(StorageStatus::Critical.exit_code(), 2);
        assert_eq!(StorageStatus::Warning.exit_code(), 0);
    }

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(500 * 1024 * 1024), "500.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
