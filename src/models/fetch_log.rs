use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FetchStatus {
    Running,
    Success,
    Failed,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Running => "running",
            FetchStatus::Success => "success",
            FetchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(FetchStatus::Running),
            "success" => Some(FetchStatus::Success),
            "failed" => Some(FetchStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchLog {
    pub id: i64,
    pub source_id: Option<i64>,
    pub status: FetchStatus,
    pub articles_found: i64,
    pub articles_added: i64,
    pub articles_skipped: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewFetchLog {
    pub source_id: Option<i64>,
    pub status: FetchStatus,
    pub articles_found: i64,
    pub articles_added: i64,
    pub articles_skipped: i64,
    pub error_message: Option<String>,
}

impl NewFetchLog {
    pub fn success(source_id: Option<i64>, found: i64, added: i64, skipped: i64) -> Self {
        Self {
            source_id,
            status: FetchStatus::Success,
            articles_found: found,
            articles_added: added,
            articles_skipped: skipped,
            error_message: None,
        }
    }

    pub fn failed(source_id: Option<i64>, error: impl Into<String>) -> Self {
        Self {
            source_id,
            status: FetchStatus::Failed,
            articles_found: 0,
            articles_added: 0,
            articles_skipped: 0,
            error_message: Some(error.into()),
        }
    }
}
