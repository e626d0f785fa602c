use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::FetchConfig;
use crate::error::{AppError, Result};

use super::{FetchedBatch, RawEntry};

const NEWS_API_URL: &str = "https://newsapi.org/v2/everything";
const QUERY: &str = "artificial intelligence OR machine learning OR ChatGPT OR AI";

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    content: Option<String>,
    author: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
}

impl From<NewsApiArticle> for RawEntry {
    fn from(item: NewsApiArticle) -> Self {
        RawEntry {
            title: item.title,
            link: item.url,
            description: item.description,
            content: item.content,
            author: item.author,
            image_url: item.url_to_image,
            published_at: item
                .published_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Aggregator search source. Items it returns carry no `source_id`.
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    config: FetchConfig,
}

impl NewsApiClient {
    pub fn new(api_key: String, config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: NEWS_API_URL.to_string(),
            config: config.clone(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn fetch(&self) -> Result<FetchedBatch> {
        let page_size = self.config.max_articles_per_source.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", QUERY),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: NewsApiResponse = response.json().await?;

        if !status.is_success() || body.status != "ok" {
            return Err(AppError::NewsApi(
                body.message
                    .unwrap_or_else(|| format!("request failed with HTTP {status}")),
            ));
        }

        let entries = body.articles.into_iter().map(RawEntry::from);
        Ok(FetchedBatch::from_entries(entries, None, &self.config, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn fetch_maps_articles_and_drops_removed_items() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "title": "OpenAI ships a new model",
                    "url": "https://news.example.com/openai",
                    "description": "The release adds tool use.",
                    "content": "Longer body text",
                    "author": "Reporter",
                    "urlToImage": "https://img.example.com/1.jpg",
                    "publishedAt": "2025-01-06T10:00:00Z"
                },
                { "title": "[Removed]", "url": "https://removed.com" }
            ]
        });

        Mock::given(method("GET"))
            .and(query_param("apiKey", "test-key"))
            .and(query_param("language", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = NewsApiClient::new("test-key".into(), &FetchConfig::default())
            .unwrap()
            .with_endpoint(server.uri());
        let batch = client.fetch().await.unwrap();

        assert_eq!(batch.articles.len(), 1);
        assert_eq!(batch.invalid, 1);
        let article = &batch.articles[0];
        assert!(article.source_id.is_none());
        assert_eq!(article.image_url.as_deref(), Some("https://img.example.com/1.jpg"));
        assert!(article.published_at.is_some());
    }

    #[tokio::test]
    async fn error_status_becomes_news_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "status": "error",
                "code": "apiKeyInvalid",
                "message": "Your API key is invalid"
            })))
            .mount(&server)
            .await;

        let client = NewsApiClient::new("bad".into(), &FetchConfig::default())
            .unwrap()
            .with_endpoint(server.uri());
        let err = client.fetch().await.unwrap_err();

        assert!(matches!(err, AppError::NewsApi(ref m) if m.contains("invalid")));
    }
}
