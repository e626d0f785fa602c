#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use news_shorts::ai::{GenerationParams, LanguageModel};
use news_shorts::db::Repository;
use news_shorts::error::{AppError, Result};
use news_shorts::feed::fingerprint;
use news_shorts::models::NewArticle;

pub enum Reply {
    Text(String),
    Status(u16, String),
}

/// Plays back canned replies; the last one repeats once the script runs out.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(text: impl Into<String>) -> Self {
        Self::new(vec![Reply::Text(text.into())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Text(text)) => {
                *self.last.lock().unwrap() = Some(text.clone());
                Ok(text)
            }
            Some(Reply::Status(status, message)) => Err(AppError::ModelApi {
                status,
                message,
                retry_after: None,
            }),
            None => Ok(self.last.lock().unwrap().clone().unwrap_or_default()),
        }
    }

    fn model_version(&self) -> &str {
        "scripted"
    }
}

pub async fn temp_repository() -> (TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("news.db");
    let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
    (dir, repo)
}

pub fn article(url: &str, content: &str) -> NewArticle {
    let now = Utc::now();
    NewArticle {
        source_id: None,
        title: format!("Story at {url}"),
        description: None,
        content: Some(content.to_string()),
        url: url.to_string(),
        url_hash: fingerprint(url),
        author: None,
        category: "general".to_string(),
        image_url: None,
        published_at: Some(now),
        fetched_at: now,
    }
}

pub fn published(mut article: NewArticle, at: DateTime<Utc>) -> NewArticle {
    article.published_at = Some(at);
    article
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

pub const LONG_CONTENT: &str = "Researchers released an open model that outperforms larger systems on \
     reasoning benchmarks while running on a single consumer GPU, according to the accompanying paper.";
