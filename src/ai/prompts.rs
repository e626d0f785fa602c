pub const FILTER_PROMPT: &str = r#"You are a content filter for an AI/Technology news app.

Analyze this article and respond with a JSON object ONLY (no markdown, no code fences, no other text).

Example response format:
{"language": "en", "is_english": true, "relevance_score": 8, "is_relevant": true, "category": "machine-learning", "reason": "Brief explanation"}

RULES:
1. language: ISO 639-1 code (en, es, zh, hi, fr, etc.)
2. is_english: true only if the article is primarily in English
3. relevance_score: 1-10 how relevant to AI/Technology
   - 10: Core AI news (new models, research breakthroughs, major AI labs)
   - 8-9: AI applications, ML research, tech industry AI
   - 6-7: General tech news with AI angle
   - 4-5: Tech news, tangentially related
   - 1-3: Off-topic (sports, politics, entertainment, non-tech)
4. is_relevant: true if relevance_score >= 6
5. category: One of [machine-learning, generative-ai, robotics, research, industry, ethics, hardware, general]
6. reason: Why approved/rejected (max 20 words)

REJECT if:
- Not in English
- About sports, entertainment, politics (unless AI-related)
- Cryptocurrency/blockchain (unless AI-related)
- Generic news not about technology
- Spam, ads, or promotional content

Article Title: {title}

Article Content:
{content}

Respond with valid JSON only. Use double quotes for all keys and string values."#;

pub const SUMMARY_PROMPT: &str = r#"You are a professional news writer for a mobile news app that shows short-form stories.

Your task: Summarize the following news article into EXACTLY 60 words.

Rules:
1. MUST be 55-65 words (aim for 60)
2. Write in a journalistic, informative tone
3. Include the most important facts: who, what, when, where and why
4. Start with the key news point, not "The article discusses..."
5. Use simple, clear English
6. Write as a single flowing paragraph
7. Do NOT include phrases like "In summary" or "This article"

Article Title: {title}

Article Content:
{content}

Write the 60-word summary now (no preamble, just the summary):"#;

/// Fills the `{title}` and `{content}` slots of a prompt template.
pub fn render(template: &str, title: &str, content: &str) -> String {
    template
        .replace("{title}", title)
        .replace("{content}", content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_both_slots() {
        let prompt = render(FILTER_PROMPT, "A title", "Some body");
        assert!(prompt.contains("Article Title: A title"));
        assert!(prompt.contains("Article Content:\nSome body"));
        assert!(!prompt.contains("{title}"));
        assert!(!prompt.contains("{content}"));
    }
}
