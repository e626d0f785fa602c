//! Turns free-form model output into typed records.
//!
//! Models asked for JSON still wrap it in code fences, answer with Python
//! literals, add commentary around the object or stop mid-object when they hit
//! the token limit. [`interpret`] walks a fixed ladder of increasingly lenient
//! repairs and stops at the first candidate that yields a valid record.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::text::truncate_chars;

const SNIPPET_CHARS: usize = 300;

/// The response could not be turned into a record. Carries a bounded snippet of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub snippet: String,
    pub detail: String,
}

impl ParseFailure {
    fn new(raw: &str, detail: impl Into<String>) -> Self {
        Self {
            snippet: truncate_chars(raw, SNIPPET_CHARS).to_string(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.detail, self.snippet)
    }
}

impl std::error::Error for ParseFailure {}

/// A record that can be validated from a JSON object.
pub trait ResponseSchema: Sized {
    fn from_object(obj: &Map<String, Value>) -> Result<Self, String>;
}

macro_rules! static_re {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex"))
        }
    };
}

static_re!(true_re, r"\bTrue\b");
static_re!(false_re, r"\bFalse\b");
static_re!(none_re, r"\bNone\b");
static_re!(single_key_re, r"'(\w[\w-]*)'\s*:");
static_re!(single_value_re, r":\s*'([^']*?)'");
static_re!(trailing_comma_re, r",\s*([}\]])");
static_re!(flat_object_re, r"\{[^{}]*\}");
static_re!(dangling_pair_re, r#",?\s*"[^"]*"\s*:\s*"?[^"{}]*$"#);

/// Removes a surrounding markdown code fence, with or without a language tag.
pub fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Python literals and single quotes to JSON; trailing commas dropped.
pub fn normalize(text: &str) -> String {
    let s = true_re().replace_all(text, "true");
    let s = false_re().replace_all(&s, "false");
    let s = none_re().replace_all(&s, "null");
    let s = single_key_re().replace_all(&s, "\"${1}\":");
    let s = single_value_re().replace_all(&s, ": \"${1}\"");
    let s = trailing_comma_re().replace_all(&s, "${1}");
    s.into_owned()
}

fn first_flat_object(text: &str) -> Option<&str> {
    flat_object_re().find(text).map(|m| m.as_str())
}

/// Closes an object cut off mid-stream. The last pair may hold a partial
/// value, so it is dropped first; closing as-is is the fallback.
fn close_truncated(text: &str) -> Vec<String> {
    let Some(start) = text.find('{') else {
        return Vec::new();
    };
    let body = &text[start..];
    if body.contains('}') {
        return Vec::new();
    }

    let close = |s: &str| format!("{}}}", s.trim_end_matches([',', ' ', '\t', '\n', '\r']));
    let without_dangling = dangling_pair_re().replace(body, "");
    let mut repaired = vec![close(without_dangling.as_ref())];
    if without_dangling != body {
        repaired.push(close(body));
    }
    repaired
}

/// Candidate texts in ladder order, without duplicates.
fn candidates(raw: &str) -> Vec<String> {
    let stripped = strip_fences(raw);
    let normalized = normalize(stripped);

    let mut out: Vec<String> = vec![stripped.to_string(), normalized.clone()];

    for source in [stripped, normalized.as_str()] {
        if let Some(obj) = first_flat_object(source) {
            out.push(obj.to_string());
            out.push(normalize(obj));
        }
    }

    for source in [normalized.as_str(), stripped] {
        out.extend(close_truncated(source));
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|c| seen.insert(c.clone()));
    out
}

/// Parses `raw` into `T`, repairing common model formatting mistakes on the way.
pub fn interpret<T: ResponseSchema>(raw: &str) -> Result<T, ParseFailure> {
    let mut schema_error = None;

    for candidate in candidates(raw) {
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&candidate) else {
            continue;
        };
        match T::from_object(&obj) {
            Ok(record) => return Ok(record),
            Err(e) => {
                schema_error.get_or_insert(e);
            }
        }
    }

    let failure = ParseFailure::new(
        raw,
        schema_error.unwrap_or_else(|| "no JSON object found".to_string()),
    );
    tracing::warn!("Could not interpret model response: {}", failure);
    Err(failure)
}

/// Classifier output for one article.
///
/// Missing flags are filled permissively on purpose: `is_english` follows the
/// language code and `is_relevant` stays `None` so the score threshold decides.
/// Approval still requires `language == "en"` and a passing score.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterVerdict {
    pub language: String,
    pub is_english: bool,
    pub relevance_score: i64,
    /// Absent when the model omitted it; callers fall back to the score threshold.
    pub is_relevant: Option<bool>,
    pub category: String,
    pub reason: String,
}

impl FilterVerdict {
    pub fn is_relevant_at(&self, min_score: i64) -> bool {
        self.is_relevant
            .unwrap_or(self.relevance_score >= min_score)
    }
}

const VERDICT_FIELDS: [&str; 4] = ["language", "is_english", "relevance_score", "is_relevant"];

impl ResponseSchema for FilterVerdict {
    fn from_object(obj: &Map<String, Value>) -> Result<Self, String> {
        if !VERDICT_FIELDS.iter().any(|f| obj.contains_key(*f)) {
            return Err("object has none of the classifier fields".to_string());
        }

        let language = obj
            .get("language")
            .and_then(Value::as_str)
            .map(primary_language)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let is_english = obj
            .get("is_english")
            .and_then(as_bool)
            .unwrap_or(language == "en");

        let relevance_score = obj
            .get("relevance_score")
            .and_then(as_score)
            .unwrap_or(0);

        Ok(Self {
            is_english,
            relevance_score,
            is_relevant: obj.get("is_relevant").and_then(as_bool),
            category: non_empty_str(obj, "category")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|| "general".to_string()),
            reason: non_empty_str(obj, "reason")
                .map(str::to_string)
                .unwrap_or_else(|| "No reason provided".to_string()),
            language,
        })
    }
}

/// `en-US`, `EN_gb` and ` en ` all become `en`.
fn primary_language(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_score(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some((raw.round() as i64).clamp(0, 10))
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Plain-text summary body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryText(pub String);

impl SummaryText {
    pub fn parse(raw: &str) -> Result<Self, ParseFailure> {
        let body = strip_fences(raw);

        let from_json = if body.starts_with('{') {
            [body.to_string(), normalize(body)]
                .iter()
                .find_map(|c| match serde_json::from_str::<Value>(c) {
                    Ok(Value::Object(obj)) => non_empty_str(&obj, "summary").map(str::to_string),
                    _ => None,
                })
        } else {
            None
        };

        let text = from_json.unwrap_or_else(|| body.to_string());
        let text = strip_quotes(text.trim()).trim().to_string();

        if text.is_empty() {
            return Err(ParseFailure::new(raw, "empty summary"));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

fn strip_quotes(text: &str) -> &str {
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if text.chars().count() >= 2 && text.starts_with(open) && text.ends_with(close) {
            return &text[open.len_utf8()..text.len() - close.len_utf8()];
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(raw: &str) -> FilterVerdict {
        interpret::<FilterVerdict>(raw).unwrap()
    }

    #[test]
    fn strict_json() {
        let v = verdict(
            r#"{"language": "en", "is_english": true, "relevance_score": 8, "is_relevant": true, "category": "research", "reason": "New model"}"#,
        );
        assert_eq!(v.language, "en");
        assert!(v.is_english);
        assert_eq!(v.relevance_score, 8);
        assert_eq!(v.is_relevant, Some(true));
        assert_eq!(v.category, "research");
        assert_eq!(v.reason, "New model");
    }

    #[test]
    fn fenced_python_literal_response() {
        let raw = "```json\n{'language': 'en', 'is_english': True, 'relevance_score': 9, 'is_relevant': True, 'category': 'machine-learning', 'reason': 'Core AI news',}\n```";
        let v = verdict(raw);
        assert_eq!(v.language, "en");
        assert_eq!(v.relevance_score, 9);
        assert!(v.is_english);
        assert_eq!(v.is_relevant, Some(true));
    }

    #[test]
    fn object_embedded_in_commentary() {
        let raw = r#"Sure! Here is my analysis: {"language": "fr", "relevance_score": 3} Hope that helps."#;
        let v = verdict(raw);
        assert_eq!(v.language, "fr");
        assert!(!v.is_english);
        assert_eq!(v.relevance_score, 3);
        assert!(!v.is_relevant_at(6));
    }

    #[test]
    fn truncated_object_is_closed() {
        let raw = r#"{"language": "en", "is_english": true, "relevance_score": 7, "reason": "Discusses new chip des"#;
        let v = verdict(raw);
        assert_eq!(v.relevance_score, 7);
        assert_eq!(v.reason, "No reason provided");
    }

    #[test]
    fn trailing_pair_of_truncated_object_is_dropped() {
        let v = verdict(r#"{"language":"en","is_english":true,"is_relevant":true,"relevance_score": 1"#);
        assert_eq!(v.relevance_score, 0);
        assert_eq!(v.is_relevant, Some(true));

        let v = verdict(r#"{"language": "en", "relevance_score": 8,"#);
        assert_eq!(v.relevance_score, 0);
    }

    #[test]
    fn lone_truncated_pair_falls_back_to_closing_as_is() {
        let v = verdict(r#"{"relevance_score": 8,"#);
        assert_eq!(v.relevance_score, 8);
    }

    #[test]
    fn score_coercion_and_clamping() {
        assert_eq!(verdict(r#"{"relevance_score": "7"}"#).relevance_score, 7);
        assert_eq!(verdict(r#"{"relevance_score": 7.6}"#).relevance_score, 8);
        assert_eq!(verdict(r#"{"relevance_score": 42}"#).relevance_score, 10);
        assert_eq!(verdict(r#"{"relevance_score": -3}"#).relevance_score, 0);
        assert_eq!(verdict(r#"{"relevance_score": "high"}"#).relevance_score, 0);
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let v = verdict(r#"{"language": "EN-us"}"#);
        assert_eq!(v.language, "en");
        assert!(v.is_english);
        assert_eq!(v.relevance_score, 0);
        assert_eq!(v.is_relevant, None);
        assert_eq!(v.category, "general");
        assert_eq!(v.reason, "No reason provided");
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        let err = interpret::<FilterVerdict>("I cannot help with that.").unwrap_err();
        assert!(err.snippet.starts_with("I cannot"));

        assert!(interpret::<FilterVerdict>("").is_err());
        assert!(interpret::<FilterVerdict>("[1, 2, 3]").is_err());
    }

    #[test]
    fn object_without_classifier_fields_is_a_failure() {
        let err = interpret::<FilterVerdict>(r#"{"answer": "yes"}"#).unwrap_err();
        assert!(err.detail.contains("classifier fields"));
    }

    #[test]
    fn failure_snippet_is_bounded() {
        let raw = "x".repeat(1000);
        let err = interpret::<FilterVerdict>(&raw).unwrap_err();
        assert_eq!(err.snippet.chars().count(), 300);
    }

    #[test]
    fn summary_text_strips_fences_and_quotes() {
        let s = SummaryText::parse("```\n\"Researchers unveiled a model.\"\n```").unwrap();
        assert_eq!(s.as_str(), "Researchers unveiled a model.");
    }

    #[test]
    fn summary_text_reads_json_summary_field() {
        let s = SummaryText::parse(r#"{"summary": "A short story."}"#).unwrap();
        assert_eq!(s.into_inner(), "A short story.");
    }

    #[test]
    fn empty_summary_fails() {
        assert!(SummaryText::parse("  \"\"  ").is_err());
        assert!(SummaryText::parse("```\n```").is_err());
    }
}
