use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SummaryOutcome {
    Summarized { text: String, words: usize },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Not approved, already summarized, or deleted. Nothing is written.
    NotEligible,
    InsufficientContent,
    /// Every attempt produced a word count outside the accepted band.
    OutOfBand,
    ModelUnavailable,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NotEligible => "not eligible",
            SkipReason::InsufficientContent => "insufficient content",
            SkipReason::OutOfBand => "word count out of band",
            SkipReason::ModelUnavailable => "model unavailable",
        }
    }
}
