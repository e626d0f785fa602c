use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    Article, ArticleStats, FetchLog, FetchStatus, FilterDecision, FilterStatistics, NewArticle,
    NewFetchLog, NewSource, NewStorageMetric, Source, StorageMetric,
};

use super::schema::SCHEMA;
use super::{parse_db_time, to_db_time};

const ARTICLE_COLUMNS: &str = "id, source_id, title, description, content, url, url_hash, author, \
     category, image_url, published_at, fetched_at, is_filtered, is_approved, detected_language, \
     relevance_score, filter_reason, is_summarized, summary_60, summary_generated_at, is_deleted, \
     created_at";

/// Row counts per table, soft-deleted articles included.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableCounts {
    pub articles: i64,
    pub sources: i64,
    pub fetch_logs: i64,
    pub storage_metrics: i64,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Source operations

    /// Returns `None` when a source with the same URL already exists.
    pub async fn insert_source(&self, source: NewSource) -> Result<Option<i64>> {
        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO sources (name, url) VALUES (?1, ?2) ON CONFLICT(url) DO NOTHING",
                    params![source.name, source.url],
                )?;
                Ok((inserted > 0).then(|| conn.last_insert_rowid()))
            })
            .await?;
        Ok(id)
    }

    pub async fn get_active_sources(&self) -> Result<Vec<Source>> {
        self.query_sources("SELECT id, name, url, is_active, last_fetched_at FROM sources WHERE is_active = 1 ORDER BY id")
            .await
    }

    pub async fn get_all_sources(&self) -> Result<Vec<Source>> {
        self.query_sources("SELECT id, name, url, is_active, last_fetched_at FROM sources ORDER BY name")
            .await
    }

    async fn query_sources(&self, sql: &'static str) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(sql)?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    pub async fn update_source_last_fetched(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let at = to_db_time(at);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET last_fetched_at = ?1 WHERE id = ?2",
                    params![at, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Article operations

    /// Inserts unless `url_hash` is already present. Returns whether a row was added.
    pub async fn upsert_article(&self, article: NewArticle) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO articles (source_id, title, description, content, url, url_hash,
                                             author, category, image_url, published_at, fetched_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                       ON CONFLICT(url_hash) DO NOTHING"#,
                    params![
                        article.source_id,
                        article.title,
                        article.description,
                        article.content,
                        article.url,
                        article.url_hash,
                        article.author,
                        article.category,
                        article.image_url,
                        article.published_at.map(to_db_time),
                        to_db_time(article.fetched_at),
                    ],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1");
                let article = conn
                    .query_row(&sql, params![id], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn get_article_by_hash(&self, url_hash: &str) -> Result<Option<Article>> {
        let url_hash = url_hash.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE url_hash = ?1");
                let article = conn
                    .query_row(&sql, params![url_hash], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Filter queue, most recently fetched first.
    pub async fn get_unfiltered_articles(&self, limit: usize) -> Result<Vec<Article>> {
        self.query_articles(
            "WHERE is_filtered = 0 AND is_deleted = 0 ORDER BY fetched_at DESC, id DESC LIMIT ?1",
            limit,
        )
        .await
    }

    /// Summary queue, most recently fetched first.
    pub async fn get_approved_unsummarized(&self, limit: usize) -> Result<Vec<Article>> {
        self.query_articles(
            "WHERE is_approved = 1 AND is_summarized = 0 AND is_deleted = 0 ORDER BY fetched_at DESC, id DESC LIMIT ?1",
            limit,
        )
        .await
    }

    async fn query_articles(&self, clause: &'static str, limit: usize) -> Result<Vec<Article>> {
        let limit = limit as i64;
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles {clause}");
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params![limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Records a filter decision. Already-filtered or deleted rows are left untouched.
    pub async fn update_article_filter(&self, id: i64, decision: &FilterDecision) -> Result<bool> {
        let decision = decision.clone();
        let updated = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE articles SET
                           is_filtered = 1,
                           is_approved = ?1,
                           detected_language = ?2,
                           relevance_score = ?3,
                           filter_reason = ?4,
                           category = ?5
                       WHERE id = ?6 AND is_filtered = 0 AND is_deleted = 0"#,
                    params![
                        decision.is_approved,
                        decision.detected_language,
                        decision.relevance_score,
                        decision.reason,
                        decision.category,
                        id,
                    ],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(updated)
    }

    /// Soft-deletes filtered, rejected articles fetched before `before`.
    pub async fn soft_delete_rejected_before(&self, before: DateTime<Utc>) -> Result<usize> {
        let before = to_db_time(before);
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE articles SET is_deleted = 1
                       WHERE is_filtered = 1 AND is_approved = 0 AND is_deleted = 0
                         AND fetched_at < ?1"#,
                    params![before],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed)
    }

    pub async fn filter_statistics(&self) -> Result<FilterStatistics> {
        let stats = self
            .conn
            .call(|conn| {
                let stats = conn.query_row(
                    r#"SELECT
                           COUNT(*),
                           COALESCE(SUM(is_approved = 1), 0),
                           COALESCE(SUM(is_filtered = 1 AND is_approved = 0), 0),
                           COALESCE(SUM(is_filtered = 0), 0)
                       FROM articles WHERE is_deleted = 0"#,
                    [],
                    |row| {
                        Ok(FilterStatistics {
                            total: row.get(0)?,
                            approved: row.get(1)?,
                            rejected: row.get(2)?,
                            pending: row.get(3)?,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }

    /// Stores a summary. Only approved, unsummarized rows are changed.
    pub async fn save_summary(&self, id: i64, summary: String, at: DateTime<Utc>) -> Result<bool> {
        let at = to_db_time(at);
        let updated = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE articles SET summary_60 = ?1, is_summarized = 1, summary_generated_at = ?2
                       WHERE id = ?3 AND is_approved = 1 AND is_summarized = 0"#,
                    params![summary, at, id],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(updated)
    }

    /// Marks an article summarized without summary text.
    pub async fn mark_summary_skipped(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let at = to_db_time(at);
        let updated = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE articles SET is_summarized = 1, summary_generated_at = ?1
                       WHERE id = ?2 AND is_approved = 1 AND is_summarized = 0"#,
                    params![at, id],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(updated)
    }

    // Retention queries

    pub async fn count_active_articles(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM articles WHERE is_deleted = 0", None)
            .await
    }

    pub async fn count_expired_articles(&self, cutoff: DateTime<Utc>) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM articles WHERE is_deleted = 0 AND COALESCE(published_at, fetched_at) < ?1",
            Some(to_db_time(cutoff)),
        )
        .await
    }

    async fn count(&self, sql: &'static str, param: Option<String>) -> Result<i64> {
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = match param {
                    Some(p) => conn.query_row(sql, params![p], |row| row.get(0))?,
                    None => conn.query_row(sql, [], |row| row.get(0))?,
                };
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    /// One batch of non-deleted articles older than `cutoff`, by `published_at` or `fetched_at`.
    pub async fn expired_article_ids(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<i64>> {
        let cutoff = to_db_time(cutoff);
        let limit = limit as i64;
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id FROM articles
                       WHERE is_deleted = 0 AND COALESCE(published_at, fetched_at) < ?1
                       ORDER BY id LIMIT ?2"#,
                )?;
                let ids = stmt
                    .query_map(params![cutoff, limit], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Oldest non-deleted articles. Missing `published_at` sorts first.
    pub async fn oldest_article_ids(&self, limit: usize) -> Result<Vec<i64>> {
        let limit = limit as i64;
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id FROM articles WHERE is_deleted = 0
                       ORDER BY published_at ASC NULLS FIRST, created_at ASC, id ASC
                       LIMIT ?1"#,
                )?;
                let ids = stmt
                    .query_map(params![limit], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Hard delete by id list.
    pub async fn delete_articles(&self, ids: Vec<i64>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!("DELETE FROM articles WHERE id IN ({placeholders})");
                let deleted = conn.execute(&sql, params_from_iter(ids.iter()))?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }

    /// Hard-purges soft-deleted articles older than `cutoff`.
    pub async fn purge_soft_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.delete_before(
            "DELETE FROM articles WHERE is_deleted = 1 AND COALESCE(published_at, fetched_at) < ?1",
            cutoff,
        )
        .await
    }

    pub async fn purge_fetch_logs_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.delete_before("DELETE FROM fetch_logs WHERE created_at < ?1", cutoff)
            .await
    }

    pub async fn purge_storage_metrics_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.delete_before("DELETE FROM storage_metrics WHERE measured_at < ?1", cutoff)
            .await
    }

    async fn delete_before(&self, sql: &'static str, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = to_db_time(cutoff);
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(sql, params![cutoff])?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn article_stats(&self) -> Result<ArticleStats> {
        let stats = self
            .conn
            .call(|conn| {
                let (total_count, oldest, newest) = conn.query_row(
                    r#"SELECT COUNT(*),
                              MIN(COALESCE(published_at, created_at)),
                              MAX(COALESCE(published_at, created_at))
                       FROM articles WHERE is_deleted = 0"#,
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                )?;
                Ok(ArticleStats {
                    total_count,
                    oldest: oldest.as_deref().and_then(parse_db_time),
                    newest: newest.as_deref().and_then(parse_db_time),
                })
            })
            .await?;
        Ok(stats)
    }

    // Fetch log operations

    pub async fn insert_fetch_log(&self, log: NewFetchLog, at: DateTime<Utc>) -> Result<i64> {
        let at = to_db_time(at);
        let id = self
            .conn
            .call(move |conn| {
                let completed_at = (log.status != FetchStatus::Running).then(|| at.clone());
                conn.execute(
                    r#"INSERT INTO fetch_logs (source_id, status, articles_found, articles_added,
                                               articles_skipped, error_message, created_at, completed_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        log.source_id,
                        log.status.as_str(),
                        log.articles_found,
                        log.articles_added,
                        log.articles_skipped,
                        log.error_message,
                        at,
                        completed_at,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn recent_fetch_logs(&self, limit: usize) -> Result<Vec<FetchLog>> {
        let limit = limit as i64;
        let logs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, source_id, status, articles_found, articles_added, articles_skipped,
                              error_message, created_at, completed_at
                       FROM fetch_logs ORDER BY created_at DESC, id DESC LIMIT ?1"#,
                )?;
                let logs = stmt
                    .query_map(params![limit], fetch_log_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await?;
        Ok(logs)
    }

    // Storage metrics

    pub async fn record_storage_metric(&self, metric: NewStorageMetric, at: DateTime<Utc>) -> Result<i64> {
        let at = to_db_time(at);
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO storage_metrics (total_size_bytes, articles_count, articles_size_bytes, measured_at)
                       VALUES (?1, ?2, ?3, ?4)"#,
                    params![
                        metric.total_size_bytes,
                        metric.articles_count,
                        metric.articles_size_bytes,
                        at
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn latest_storage_metric(&self) -> Result<Option<StorageMetric>> {
        let metric = self
            .conn
            .call(|conn| {
                let metric = conn
                    .query_row(
                        r#"SELECT id, total_size_bytes, articles_count, articles_size_bytes, measured_at
                           FROM storage_metrics ORDER BY measured_at DESC, id DESC LIMIT 1"#,
                        [],
                        |row| {
                            Ok(StorageMetric {
                                id: row.get(0)?,
                                total_size_bytes: row.get(1)?,
                                articles_count: row.get(2)?,
                                articles_size_bytes: row.get(3)?,
                                measured_at: required_time(row, 4)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(metric)
            })
            .await?;
        Ok(metric)
    }

    pub async fn table_counts(&self) -> Result<TableCounts> {
        let counts = self
            .conn
            .call(|conn| {
                let counts = conn.query_row(
                    r#"SELECT (SELECT COUNT(*) FROM articles),
                              (SELECT COUNT(*) FROM sources),
                              (SELECT COUNT(*) FROM fetch_logs),
                              (SELECT COUNT(*) FROM storage_metrics)"#,
                    [],
                    |row| {
                        Ok(TableCounts {
                            articles: row.get(0)?,
                            sources: row.get(1)?,
                            fetch_logs: row.get(2)?,
                            storage_metrics: row.get(3)?,
                        })
                    },
                )?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    /// Allocated database size from SQLite's page accounting.
    pub async fn database_size_bytes(&self) -> Result<i64> {
        let size = self
            .conn
            .call(|conn| {
                let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
                let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
                Ok(page_count * page_size)
            })
            .await?;
        Ok(size)
    }
}

fn required_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_time(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp {raw:?}").into(),
        )
    })
}

fn optional_time(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| parse_db_time(&s)))
}

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
        last_fetched_at: optional_time(row, 4)?,
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        content: row.get(4)?,
        url: row.get(5)?,
        url_hash: row.get(6)?,
        author: row.get(7)?,
        category: row.get(8)?,
        image_url: row.get(9)?,
        published_at: optional_time(row, 10)?,
        fetched_at: required_time(row, 11)?,
        is_filtered: row.get::<_, i64>(12)? != 0,
        is_approved: row.get::<_, i64>(13)? != 0,
        detected_language: row.get(14)?,
        relevance_score: row.get(15)?,
        filter_reason: row.get(16)?,
        is_summarized: row.get::<_, i64>(17)? != 0,
        summary_60: row.get(18)?,
        summary_generated_at: optional_time(row, 19)?,
        is_deleted: row.get::<_, i64>(20)? != 0,
        created_at: required_time(row, 21)?,
    })
}

fn fetch_log_from_row(row: &Row) -> rusqlite::Result<FetchLog> {
    let status: String = row.get(2)?;
    let status = FetchStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown fetch status {status:?}").into(),
        )
    })?;

    Ok(FetchLog {
        id: row.get(0)?,
        source_id: row.get(1)?,
        status,
        articles_found: row.get(3)?,
        articles_added: row.get(4)?,
        articles_skipped: row.get(5)?,
        error_message: row.get(6)?,
        created_at: required_time(row, 7)?,
        completed_at: optional_time(row, 8)?,
    })
}
