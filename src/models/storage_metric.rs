use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StorageMetric {
    pub id: i64,
    pub total_size_bytes: i64,
    pub articles_count: i64,
    pub articles_size_bytes: i64,
    pub measured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewStorageMetric {
    pub total_size_bytes: i64,
    pub articles_count: i64,
    pub articles_size_bytes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StorageStatus {
    Ok,
    Warning,
    Critical,
}

impl StorageStatus {
    /// Process exit code used for downstream alerting.
    pub fn exit_code(&self) -> i32 {
        match self {
            StorageStatus::Critical => 2,
            StorageStatus::Ok | StorageStatus::Warning => 0,
        }
    }
}

impl fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StorageStatus::Ok => "OK",
            StorageStatus::Warning => "WARNING",
            StorageStatus::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}
