use std::time::Duration;

use chrono::Utc;

use crate::config::FetchConfig;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{FeedFetcher, FetchedBatch, NewsApiClient};
use crate::models::{NewFetchLog, Source};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub sources: usize,
    pub found: usize,
    pub added: usize,
    /// Already stored (same fingerprint).
    pub skipped: usize,
    /// Entries dropped for a missing title or unusable URL.
    pub invalid: usize,
    /// Sources that could not be fetched or parsed.
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct IngestStage<'a> {
    repo: &'a Repository,
    fetcher: &'a FeedFetcher,
    newsapi: Option<&'a NewsApiClient>,
    config: &'a FetchConfig,
}

impl<'a> IngestStage<'a> {
    pub fn new(
        repo: &'a Repository,
        fetcher: &'a FeedFetcher,
        newsapi: Option<&'a NewsApiClient>,
        config: &'a FetchConfig,
    ) -> Self {
        Self {
            repo,
            fetcher,
            newsapi,
            config,
        }
    }

    /// Upserts a batch. Duplicates count as skipped; a failed insert does not stop the batch.
    pub async fn store_batch(&self, batch: FetchedBatch) -> StoreCounts {
        let mut counts = StoreCounts::default();
        for article in batch.articles {
            let url = article.url.clone();
            match self.repo.upsert_article(article).await {
                Ok(true) => counts.added += 1,
                Ok(false) => counts.skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to store {}: {}", url, e);
                    counts.failed += 1;
                }
            }
        }
        counts
    }

    async fn ingest_source(&self, source: &Source, report: &mut IngestReport) -> Result<()> {
        tracing::info!("Fetching {} ({})", source.name, source.url);

        let log = match self.fetcher.fetch_feed(source.id, &source.url).await {
            Ok(batch) => {
                let found = batch.found();
                let invalid = batch.invalid;
                let counts = self.store_batch(batch).await;

                report.found += found;
                report.invalid += invalid;
                report.added += counts.added;
                report.skipped += counts.skipped;
                tracing::info!(
                    "  {}: {} found, {} added, {} skipped, {} invalid",
                    source.name,
                    found,
                    counts.added,
                    counts.skipped,
                    invalid
                );
                NewFetchLog::success(
                    Some(source.id),
                    found as i64,
                    counts.added as i64,
                    counts.skipped as i64,
                )
            }
            Err(e) => {
                tracing::error!("  Failed to fetch {}: {}", source.name, e);
                report.errors += 1;
                NewFetchLog::failed(Some(source.id), e.to_string())
            }
        };

        let now = Utc::now();
        self.repo.insert_fetch_log(log, now).await?;
        self.repo.update_source_last_fetched(source.id, now).await?;
        Ok(())
    }

    async fn ingest_newsapi(&self, client: &NewsApiClient, report: &mut IngestReport) -> Result<()> {
        tracing::info!("Fetching from NewsAPI");

        let log = match client.fetch().await {
            Ok(batch) => {
                let found = batch.found();
                report.found += found;
                report.invalid += batch.invalid;
                let counts = self.store_batch(batch).await;
                report.added += counts.added;
                report.skipped += counts.skipped;
                tracing::info!("  NewsAPI: {} added, {} skipped", counts.added, counts.skipped);
                NewFetchLog::success(None, found as i64, counts.added as i64, counts.skipped as i64)
            }
            Err(e) => {
                tracing::error!("  NewsAPI fetch failed: {}", e);
                report.errors += 1;
                NewFetchLog::failed(None, e.to_string())
            }
        };

        self.repo.insert_fetch_log(log, Utc::now()).await?;
        Ok(())
    }

    /// Fetches every active source in turn, then the aggregator API when configured.
    pub async fn run(&self) -> Result<IngestReport> {
        let sources = self.repo.get_active_sources().await?;
        let mut report = IngestReport {
            sources: sources.len(),
            ..Default::default()
        };

        if sources.is_empty() && self.newsapi.is_none() {
            tracing::warn!("No active sources to fetch");
        }

        for (i, source) in sources.iter().enumerate() {
            if i > 0 && self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
            if let Err(e) = self.ingest_source(source, &mut report).await {
                tracing::error!("Failed to record fetch of {}: {}", source.name, e);
                report.errors += 1;
            }
        }

        if let Some(client) = self.newsapi {
            if let Err(e) = self.ingest_newsapi(client, &mut report).await {
                tracing::error!("Failed to record NewsAPI fetch: {}", e);
                report.errors += 1;
            }
        }

        tracing::info!(
            "Fetch complete: {} sources, {} found, {} added, {} skipped, {} invalid, {} errors",
            report.sources,
            report.found,
            report.added,
            report.skipped,
            report.invalid,
            report.errors
        );

        Ok(report)
    }
}
