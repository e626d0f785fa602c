use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;

use crate::ai::prompts::{render, SUMMARY_PROMPT};
use crate::ai::{Attempt, GenerationParams, LanguageModel, Pacer, RetryPolicy, SummaryText};
use crate::config::SummaryConfig;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Article, SkipReason, SummaryOutcome};
use crate::text::{short_title, truncate_for_prompt, word_count};

const PROMPT_CONTENT_CHARS: usize = 5000;

/// Accepted summary length in words. The prompt asks for 55-65.
pub const WORD_BAND: RangeInclusive<usize> = 50..=75;

const SUMMARY_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.7,
    top_p: 0.95,
    max_tokens: 200,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub processed: usize,
    pub summarized: usize,
    pub skipped: usize,
    /// Rows whose outcome could not be written.
    pub failed: usize,
}

pub struct SummarizeStage<'a> {
    repo: &'a Repository,
    model: &'a dyn LanguageModel,
    config: &'a SummaryConfig,
    policy: RetryPolicy,
    pacer: Pacer,
}

impl<'a> SummarizeStage<'a> {
    pub fn new(
        repo: &'a Repository,
        model: &'a dyn LanguageModel,
        config: &'a SummaryConfig,
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

    /// Summarizes and persists one article.
    ///
    /// Ineligible articles are left untouched. Any other skip marks the article
    /// summarized with no text so it leaves the queue.
    pub async fn summarize(&mut self, article: &Article) -> Result<SummaryOutcome> {
        if !article.is_summary_eligible() {
            return Ok(SummaryOutcome::Skipped(SkipReason::NotEligible));
        }

        let outcome = self.generate(article).await?;
        let now = Utc::now();

        let written = match &outcome {
            SummaryOutcome::Summarized { text, .. } => {
                self.repo.save_summary(article.id, text.clone(), now).await?
            }
            SummaryOutcome::Skipped(_) => self.repo.mark_summary_skipped(article.id, now).await?,
        };
        if !written {
            tracing::debug!("Article {} changed state before its summary was stored", article.id);
        }

        Ok(outcome)
    }

    async fn generate(&mut self, article: &Article) -> Result<SummaryOutcome> {
        let text = article.body_text().trim();
        if text.chars().count() < self.config.min_content_length {
            return Ok(SummaryOutcome::Skipped(SkipReason::InsufficientContent));
        }

        let prompt = render(
            SUMMARY_PROMPT,
            &article.title,
            &truncate_for_prompt(text, PROMPT_CONTENT_CHARS),
        );
        let model = self.model;
        let prompt = prompt.as_str();
        let out_of_band = AtomicBool::new(false);
        let out_of_band = &out_of_band;

        let outcome = self
            .policy
            .run(&mut self.pacer, |_| async move {
                let raw = match model.generate(prompt, &SUMMARY_PARAMS).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        out_of_band.store(false, Ordering::Relaxed);
                        return Attempt::from_error(&e);
                    }
                };
                let summary = match SummaryText::parse(&raw) {
                    Ok(summary) => summary,
                    Err(failure) => {
                        out_of_band.store(true, Ordering::Relaxed);
                        return Attempt::retryable(failure.detail);
                    }
                };

                let words = word_count(summary.as_str());
                if WORD_BAND.contains(&words) {
                    Attempt::Success((summary.into_inner(), words))
                } else {
                    out_of_band.store(true, Ordering::Relaxed);
                    Attempt::retryable(format!("summary has {words} words"))
                }
            })
            .await;

        match outcome {
            Attempt::Success((text, words)) => Ok(SummaryOutcome::Summarized { text, words }),
            Attempt::Retryable { reason, .. } => {
                let skip = if out_of_band.load(Ordering::Relaxed) {
                    SkipReason::OutOfBand
                } else {
                    SkipReason::ModelUnavailable
                };
                tracing::warn!(
                    "Skipping summary for {}: {}",
                    short_title(&article.title, 60),
                    reason
                );
                Ok(SummaryOutcome::Skipped(skip))
            }
            Attempt::Fatal(reason) => Err(AppError::ModelRejected(reason)),
        }
    }

    /// Summarizes one batch of approved articles, newest first.
    pub async fn run(&mut self) -> Result<SummaryReport> {
        let articles = self
            .repo
            .get_approved_unsummarized(self.config.batch_size)
            .await?;
        tracing::info!(
            "Summarizing {} articles with {}",
            articles.len(),
            self.model.model_version()
        );

        let mut report = SummaryReport::default();
        for article in &articles {
            report.processed += 1;
            match self.summarize(article).await {
                Ok(SummaryOutcome::Summarized { words, .. }) => {
                    tracing::debug!("Summarized {} ({} words)", short_title(&article.title, 60), words);
                    report.summarized += 1;
                }
                Ok(SummaryOutcome::Skipped(reason)) => {
                    tracing::debug!("Skipped {}: {}", short_title(&article.title, 60), reason.label());
                    report.skipped += 1;
                }
                Err(e @ AppError::ModelRejected(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("Failed to store summary for article {}: {}", article.id, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Summary run complete: {} processed, {} summarized, {} skipped, {} failed",
            report.processed,
            report.summarized,
            report.skipped,
            report.failed
        );

        Ok(report)
    }
}
