mod categorize;
mod fetcher;
mod fingerprint;
mod newsapi;
mod opml;

pub use categorize::{categorize, CATEGORY_KEYWORDS, DEFAULT_CATEGORY};
pub use fetcher::FeedFetcher;
pub use fingerprint::{fingerprint, normalize_url, validate_url};
pub use newsapi::NewsApiClient;
pub use self::opml::{parse_opml, parse_opml_file};

use chrono::{DateTime, Utc};

use crate::config::FetchConfig;
use crate::models::NewArticle;
use crate::text::{clean_html, truncate_text};

/// An entry as it comes off the wire, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Result of one fetch: accepted candidates plus the entries that failed validation.
#[derive(Debug, Default)]
pub struct FetchedBatch {
    pub articles: Vec<NewArticle>,
    pub invalid: usize,
}

impl FetchedBatch {
    pub fn from_entries(
        entries: impl IntoIterator<Item = RawEntry>,
        source_id: Option<i64>,
        config: &FetchConfig,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let mut batch = Self::default();
        for entry in entries {
            match build_candidate(entry, source_id, config, fetched_at) {
                Some(article) => batch.articles.push(article),
                None => batch.invalid += 1,
            }
        }
        batch
    }

    pub fn found(&self) -> usize {
        self.articles.len() + self.invalid
    }
}

/// Cleans and validates an entry. Entries without a title or a usable URL are dropped.
pub fn build_candidate(
    entry: RawEntry,
    source_id: Option<i64>,
    config: &FetchConfig,
    fetched_at: DateTime<Utc>,
) -> Option<NewArticle> {
    let title = entry
        .title
        .map(|t| clean_html(&t))
        .filter(|t| !t.is_empty() && t != "[Removed]")?;

    let url = entry
        .link
        .as_deref()
        .and_then(validate_url)
        .map(|u| u.to_string())?;

    let description = entry
        .description
        .map(|d| truncate_text(&clean_html(&d), config.max_description_length))
        .filter(|d| !d.is_empty());
    let content = entry
        .content
        .map(|c| truncate_text(&clean_html(&c), config.max_content_length))
        .filter(|c| !c.is_empty());

    let category = categorize(&title, description.as_deref().unwrap_or("")).to_string();

    Some(NewArticle {
        source_id,
        url_hash: fingerprint(&url),
        title,
        description,
        content,
        url,
        author: entry.author.filter(|a| !a.trim().is_empty()),
        category,
        image_url: entry.image_url,
        published_at: entry.published_at,
        fetched_at,
    })
}
