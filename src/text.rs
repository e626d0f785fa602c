use std::sync::OnceLock;

use regex::Regex;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Converts an HTML fragment to a single line of readable text.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let text = html2text::from_read(html.as_bytes(), 10_000)
        .unwrap_or_else(|_| html.to_string());

    whitespace_re().replace_all(&text, " ").trim().to_string()
}

/// Returns at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncates for storage, backing up to a word boundary when one is close to the limit.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut truncated = truncate_chars(text, max_chars);
    if let Some(last_space) = truncated.rfind(' ') {
        let kept = truncated[..last_space].chars().count();
        if kept * 5 > max_chars * 4 {
            truncated = &truncated[..last_space];
        }
    }

    format!("{truncated}...")
}

/// Truncates a prompt input, marking the cut with an ellipsis.
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Short single-line form of a title for log output.
pub fn short_title(title: &str, max_chars: usize) -> String {
    let cut = truncate_chars(title, max_chars);
    if cut.len() < title.len() {
        format!("{cut}...")
    } else {
        title.to_string()
    }
}
