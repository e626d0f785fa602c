use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ai::prompts::{render, FILTER_PROMPT};
use crate::ai::{interpret, Attempt, FilterVerdict, GenerationParams, LanguageModel, Pacer, RetryPolicy};
use crate::config::FilterConfig;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::DEFAULT_CATEGORY;
use crate::models::{Article, DecisionKind, FilterDecision, FilterStatistics};
use crate::text::{short_title, truncate_for_prompt};

use super::start_of_utc_day;

const PROMPT_CONTENT_CHARS: usize = 2000;

const FILTER_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.1,
    top_p: 1.0,
    max_tokens: 1024,
};

#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    pub processed: usize,
    pub approved: usize,
    pub rejected_language: usize,
    pub rejected_relevance: usize,
    pub rejected_short: usize,
    /// Analysis failures plus rows that could not be written.
    pub failed: usize,
    pub stale_rejections_removed: usize,
    pub before: FilterStatistics,
    pub after: FilterStatistics,
}

impl FilterReport {
    fn count(&mut self, kind: DecisionKind) {
        match kind {
            DecisionKind::Approved => self.approved += 1,
            DecisionKind::RejectedLanguage => self.rejected_language += 1,
            DecisionKind::RejectedRelevance => self.rejected_relevance += 1,
            DecisionKind::RejectedShort => self.rejected_short += 1,
            DecisionKind::Failed => self.failed += 1,
        }
    }
}

/// Turns a classifier verdict into a stored decision.
///
/// Approval needs English (both the flag and the language code), relevance,
/// and a score at or above `min_score`.
pub fn decide(verdict: FilterVerdict, min_score: i64, fallback_category: &str) -> FilterDecision {
    let english = verdict.is_english && verdict.language == "en";
    let relevant = verdict.is_relevant_at(min_score) && verdict.relevance_score >= min_score;

    let kind = match (english, relevant) {
        (true, true) => DecisionKind::Approved,
        (false, _) => DecisionKind::RejectedLanguage,
        (true, false) => DecisionKind::RejectedRelevance,
    };

    // A generic model answer does not override a keyword match from ingest.
    let category = if verdict.category == DEFAULT_CATEGORY {
        fallback_category.to_string()
    } else {
        verdict.category
    };

    FilterDecision {
        is_approved: kind == DecisionKind::Approved,
        detected_language: verdict.language,
        relevance_score: verdict.relevance_score,
        reason: verdict.reason,
        category,
        kind,
    }
}

fn rejection(article: &Article, reason: String, kind: DecisionKind) -> FilterDecision {
    FilterDecision {
        is_approved: false,
        detected_language: "unknown".to_string(),
        relevance_score: 0,
        reason,
        category: article.category.clone(),
        kind,
    }
}

pub struct FilterStage<'a> {
    repo: &'a Repository,
    model: &'a dyn LanguageModel,
    config: &'a FilterConfig,
    policy: RetryPolicy,
    pacer: Pacer,
}

impl<'a> FilterStage<'a> {
    pub fn new(
        repo: &'a Repository,
        model: &'a dyn LanguageModel,
        config: &'a FilterConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            repo,
            model,
            config,
            policy,
            pacer: Pacer::new(Duration::from_millis(config.rate_limit_delay_ms)),
        }
    }

    /// Classifies one article. Errors only when the provider rejects the credentials.
    pub async fn filter(&mut self, article: &Article) -> Result<FilterDecision> {
        let text = article.body_text().trim();
        if text.chars().count() < self.config.min_content_length {
            return Ok(rejection(
                article,
                "Content too short".to_string(),
                DecisionKind::RejectedShort,
            ));
        }

        let prompt = render(
            FILTER_PROMPT,
            &article.title,
            &truncate_for_prompt(text, PROMPT_CONTENT_CHARS),
        );
        let model = self.model;
        let prompt = prompt.as_str();

        let outcome = self
            .policy
            .run(&mut self.pacer, |_| async move {
                match model.generate(prompt, &FILTER_PARAMS).await {
                    Ok(raw) => Attempt::Success(raw),
                    Err(e) => Attempt::from_error(&e),
                }
            })
            .await;

        match outcome {
            Attempt::Success(raw) => match interpret::<FilterVerdict>(&raw) {
                Ok(verdict) => Ok(decide(
                    verdict,
                    self.config.min_relevance_score,
                    &article.category,
                )),
                Err(_) => Ok(rejection(
                    article,
                    "Failed to analyze".to_string(),
                    DecisionKind::Failed,
                )),
            },
            Attempt::Retryable { reason, .. } => Ok(rejection(
                article,
                format!("API error: {reason}"),
                DecisionKind::Failed,
            )),
            Attempt::Fatal(reason) => Err(AppError::ModelRejected(reason)),
        }
    }

    /// Filters one batch, then soft-deletes rejections fetched before today (UTC).
    pub async fn run(&mut self) -> Result<FilterReport> {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&mut self, now: DateTime<Utc>) -> Result<FilterReport> {
        let mut report = FilterReport {
            before: self.repo.filter_statistics().await?,
            ..Default::default()
        };

        let articles = self
            .repo
            .get_unfiltered_articles(self.config.batch_size)
            .await?;
        tracing::info!("Filtering {} articles with {}", articles.len(), self.model.model_version());

        for article in &articles {
            report.processed += 1;
            let decision = self.filter(article).await?;

            match self.repo.update_article_filter(article.id, &decision).await {
                Ok(_) => {
                    tracing::debug!(
                        "{:?} [{}] {} ({})",
                        decision.kind,
                        decision.relevance_score,
                        short_title(&article.title, 60),
                        decision.reason
                    );
                    report.count(decision.kind);
                }
                Err(e) => {
                    tracing::warn!("Failed to store filter decision for article {}: {}", article.id, e);
                    report.failed += 1;
                }
            }
        }

        report.stale_rejections_removed = match self
            .repo
            .soft_delete_rejected_before(start_of_utc_day(now))
            .await
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Failed to clean up old rejections: {}", e);
                0
            }
        };

        report.after = self.repo.filter_statistics().await?;

        tracing::info!(
            "Filter run complete: {} processed, {} approved, {} rejected (language {}, relevance {}, too short {}), {} failed, {} stale rejections removed",
            report.processed,
            report.approved,
            report.rejected_language + report.rejected_relevance + report.rejected_short,
            report.rejected_language,
            report.rejected_relevance,
            report.rejected_short,
            report.failed,
            report.stale_rejections_removed
        );
        tracing::info!(
            "Articles: {} total, {} approved, {} rejected, {} pending",
            report.after.total,
            report.after.approved,
            report.after.rejected,
            report.after.pending
        );

        Ok(report)
    }
}
