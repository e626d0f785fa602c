use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub url_hash: String,
    pub author: Option<String>,
    pub category: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub is_filtered: bool,
    pub is_approved: bool,
    pub detected_language: Option<String>,
    pub relevance_score: Option<i64>,
    pub filter_reason: Option<String>,
    pub is_summarized: bool,
    pub summary_60: Option<String>,
    pub summary_generated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Text handed to the model stages: full content, else the description.
    pub fn body_text(&self) -> &str {
        self.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or(self.description.as_deref())
            .unwrap_or("")
    }

    pub fn is_summary_eligible(&self) -> bool {
        self.is_approved && !self.is_summarized && !self.is_deleted
    }
}

/// A candidate that passed ingest validation and is ready for upsert.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub url_hash: String,
    pub author: Option<String>,
    pub category: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// How a filter decision is reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionKind {
    Approved,
    RejectedLanguage,
    RejectedRelevance,
    RejectedShort,
    /// No usable answer from the model (call failures or unparseable output).
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub is_approved: bool,
    pub detected_language: String,
    pub relevance_score: i64,
    pub reason: String,
    pub category: String,
    pub kind: DecisionKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStatistics {
    pub total: i64,
    pub approved: i64,
    pub rejected: i64,
    pub pending: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArticleStats {
    pub total_count: i64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}
