mod filter;
mod ingest;
mod monitor;
mod retention;
mod summarize;

pub use filter::{decide, FilterReport, FilterStage};
pub use ingest::{IngestReport, IngestStage, StoreCounts};
pub use monitor::{estimate_usage, format_bytes, storage_status, StorageMonitor, StorageReport, TableUsage};
pub use retention::{RetentionManager, RetentionReport};
pub use summarize::{SummarizeStage, SummaryReport, WORD_BAND};

use chrono::{DateTime, Utc};

/// Midnight UTC of the day containing `now`.
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).map(|d| d.and_utc()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn start_of_day_truncates_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 17, 45, 9).unwrap();
        assert_eq!(
            start_of_utc_day(now),
            Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap()
        );
    }
}
