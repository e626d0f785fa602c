mod article;
mod fetch_log;
mod source;
mod storage_metric;
mod summary;

pub use article::{Article, ArticleStats, DecisionKind, FilterDecision, FilterStatistics, NewArticle};
pub use fetch_log::{FetchLog, FetchStatus, NewFetchLog};
pub use source::{NewSource, Source};
pub use storage_metric::{NewStorageMetric, StorageMetric, StorageStatus};
pub use summary::{SkipReason, SummaryOutcome};
