use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use regex::Regex;
use reqwest::Client;

use crate::config::FetchConfig;
use crate::error::Result;

use super::{FetchedBatch, RawEntry};

const USER_AGENT: &str = "news-shorts/1.0";

fn img_src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<img[^>]+src=["']([^"']+)["']"#).expect("static regex")
    })
}

pub struct FeedFetcher {
    client: Client,
    config: FetchConfig,
}

impl FeedFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Downloads and parses one RSS/Atom feed into validated candidates.
    pub async fn fetch_feed(&self, source_id: i64, url: &str) -> Result<FetchedBatch> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        let feed = parser::parse(&bytes[..])?;

        Ok(self.extract(feed, source_id))
    }

    pub fn extract(&self, feed: Feed, source_id: i64) -> FetchedBatch {
        let entries = feed
            .entries
            .into_iter()
            .take(self.config.max_articles_per_source)
            .map(raw_entry);

        FetchedBatch::from_entries(entries, Some(source_id), &self.config, Utc::now())
    }
}

fn raw_entry(entry: Entry) -> RawEntry {
    let content_html = entry.content.as_ref().and_then(|c| c.body.clone());
    let image_url = image_url(&entry, content_html.as_deref());

    RawEntry {
        title: entry.title.map(|t| t.content),
        link: entry.links.first().map(|l| l.href.clone()),
        description: entry.summary.map(|s| s.content),
        content: content_html,
        author: entry.authors.first().map(|a| a.name.clone()),
        image_url,
        published_at: entry.published.or(entry.updated),
    }
}

/// Media content, then thumbnails, then the first `<img>` in the body.
fn image_url(entry: &Entry, content_html: Option<&str>) -> Option<String> {
    let from_media = entry.media.iter().find_map(|media| {
        media
            .content
            .iter()
            .find(|c| {
                c.content_type
                    .as_ref()
                    .map(|m| m.to_string().starts_with("image/"))
                    .unwrap_or(false)
            })
            .and_then(|c| c.url.as_ref().map(|u| u.to_string()))
            .or_else(|| media.thumbnails.first().map(|t| t.image.uri.clone()))
    });

    from_media.or_else(|| {
        content_html
            .and_then(|html| img_src_re().captures(html))
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>AI Wire</title>
    <link>https://aiwire.example.com</link>
    <description>Test feed</description>
    <item>
      <title>Deep learning model tops leaderboard</title>
      <link>https://aiwire.example.com/story-1?utm_source=rss</link>
      <description>&lt;p&gt;A new model posts record scores.&lt;/p&gt;</description>
      <content:encoded><![CDATA[<p>Full text <img src="https://img.example.com/a.png"/> here.</p>]]></content:encoded>
      <pubDate>Mon, 06 Jan 2025 12:00:00 GMT</pubDate>
    </item>
    <item>
      <link>https://aiwire.example.com/untitled</link>
    </item>
    <item>
      <title>Third story</title>
      <link>https://aiwire.example.com/story-3</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn extract_builds_candidates_and_counts_invalid() {
        let fetcher = FeedFetcher::new(&FetchConfig::default()).unwrap();
        let feed = parser::parse(RSS.as_bytes()).unwrap();

        let batch = fetcher.extract(feed, 7);

        assert_eq!(batch.articles.len(), 2);
        assert_eq!(batch.invalid, 1);

        let first = &batch.articles[0];
        assert_eq!(first.source_id, Some(7));
        assert_eq!(first.title, "Deep learning model tops leaderboard");
        assert_eq!(first.category, "machine-learning");
        assert!(first.published_at.is_some());
        assert_eq!(first.image_url.as_deref(), Some("https://img.example.com/a.png"));
        assert!(first.content.as_deref().unwrap().contains("Full text"));
    }

    #[test]
    fn extract_respects_per_source_limit() {
        let config = FetchConfig {
            max_articles_per_source: 1,
            ..Default::default()
        };
        let fetcher = FeedFetcher::new(&config).unwrap();
        let feed = parser::parse(RSS.as_bytes()).unwrap();

        let batch = fetcher.extract(feed, 1);

        assert_eq!(batch.found(), 1);
    }
}
