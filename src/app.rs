use std::path::Path;
use std::time::Duration;

use crate::ai::{ModelClient, RetryPolicy};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{parse_opml_file, validate_url, FeedFetcher, NewsApiClient};
use crate::models::{NewSource, Source};
use crate::pipeline::{
    FilterReport, FilterStage, IngestReport, IngestStage, RetentionManager, RetentionReport,
    StorageMonitor, StorageReport, SummarizeStage, SummaryReport,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub existing: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub ingest: IngestReport,
    pub filter: FilterReport,
    pub summary: SummaryReport,
    pub retention: RetentionReport,
    pub storage: StorageReport,
}

pub struct App {
    config: Config,
    pub repository: Repository,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        Ok(Self { config, repository })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn model_client(&self, model: &str) -> Result<ModelClient> {
        let api_key = self.config.require_model_api_key()?;
        ModelClient::new(
            api_key,
            self.config.model.api_url.as_str(),
            model,
            Duration::from_secs(self.config.model.timeout_secs),
        )
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.model.max_retries)
    }

    pub async fn fetch(&self) -> Result<IngestReport> {
        let fetcher = FeedFetcher::new(&self.config.fetch)?;
        let newsapi = match &self.config.news_api_key {
            Some(key) => Some(NewsApiClient::new(key.clone(), &self.config.fetch)?),
            None => None,
        };

        IngestStage::new(
            &self.repository,
            &fetcher,
            newsapi.as_ref(),
            &self.config.fetch,
        )
        .run()
        .await
    }

    pub async fn filter(&self) -> Result<FilterReport> {
        let model = self.model_client(&self.config.model.filter_model)?;
        FilterStage::new(
            &self.repository,
            &model,
            &self.config.filter,
            self.retry_policy(),
        )
        .run()
        .await
    }

    pub async fn summarize(&self) -> Result<SummaryReport> {
        let model = self.model_client(&self.config.model.summary_model)?;
        SummarizeStage::new(
            &self.repository,
            &model,
            &self.config.summary,
            self.retry_policy(),
        )
        .run()
        .await
    }

    /// Retention followed by a storage snapshot.
    pub async fn purge(&self) -> Result<(RetentionReport, StorageReport)> {
        let retention = RetentionManager::new(&self.repository, &self.config.retention)
            .enforce_retention()
            .await?;
        let storage = self.monitor().await?;
        Ok((retention, storage))
    }

    pub async fn monitor(&self) -> Result<StorageReport> {
        StorageMonitor::new(&self.repository, &self.config.storage)
            .check()
            .await
    }

    /// Full pipeline: fetch, filter, summarize, purge.
    pub async fn run_all(&self) -> Result<RunReport> {
        // Fail before fetching anything if the model stages cannot run.
        self.config.require_model_api_key()?;

        let ingest = self.fetch().await?;
        let filter = self.filter().await?;
        let summary = self.summarize().await?;
        let (retention, storage) = self.purge().await?;

        Ok(RunReport {
            ingest,
            filter,
            summary,
            retention,
            storage,
        })
    }

    pub async fn add_source(&self, name: &str, url: &str) -> Result<Option<i64>> {
        let url = validate_url(url)
            .ok_or_else(|| AppError::Config(format!("not an http(s) URL: {url}")))?;
        let name = if name.trim().is_empty() {
            url.host_str().unwrap_or("feed").to_string()
        } else {
            name.trim().to_string()
        };

        self.repository
            .insert_source(NewSource {
                name,
                url: url.to_string(),
            })
            .await
    }

    pub async fn import_opml(&self, path: &Path) -> Result<ImportReport> {
        let sources = parse_opml_file(path)?;
        let mut report = ImportReport::default();

        for source in sources {
            if validate_url(&source.url).is_none() {
                tracing::warn!("Skipping {} with invalid URL {}", source.name, source.url);
                report.invalid += 1;
                continue;
            }
            match self.repository.insert_source(source).await {
                Ok(Some(_)) => report.added += 1,
                Ok(None) => report.existing += 1,
                Err(e) => {
                    tracing::warn!("Failed to insert source: {}", e);
                    report.invalid += 1;
                }
            }
        }

        tracing::info!(
            "Imported {} sources ({} already present, {} invalid)",
            report.added,
            report.existing,
            report.invalid
        );
        Ok(report)
    }

    pub async fn sources(&self) -> Result<Vec<Source>> {
        self.repository.get_all_sources().await
    }
}
