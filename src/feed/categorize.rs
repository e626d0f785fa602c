pub const DEFAULT_CATEGORY: &str = "general";

/// Checked in order; the first category with a matching keyword wins.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "machine-learning",
        &[
            "machine learning",
            "ml ",
            "neural network",
            "deep learning",
            "transformer",
            "llm",
            "large language model",
            "training model",
        ],
    ),
    (
        "generative-ai",
        &[
            "generative ai",
            "gen ai",
            "chatgpt",
            "gpt-4",
            "gpt-5",
            "claude",
            "midjourney",
            "dall-e",
            "stable diffusion",
            "text-to-image",
            "image generation",
            "content generation",
        ],
    ),
    (
        "robotics",
        &[
            "robot",
            "robotics",
            "automation",
            "autonomous",
            "humanoid",
            "boston dynamics",
            "industrial robot",
        ],
    ),
    (
        "computer-vision",
        &[
            "computer vision",
            "image recognition",
            "object detection",
            "facial recognition",
            "visual ai",
            "image processing",
        ],
    ),
    (
        "nlp",
        &[
            "natural language",
            "nlp",
            "text analysis",
            "sentiment analysis",
            "speech recognition",
            "voice ai",
            "conversational ai",
        ],
    ),
    (
        "ethics",
        &[
            "ai ethics",
            "bias",
            "fairness",
            "responsible ai",
            "ai safety",
            "alignment",
            "regulation",
            "governance",
            "privacy",
        ],
    ),
    (
        "research",
        &[
            "research",
            "paper",
            "study",
            "breakthrough",
            "discovery",
            "arxiv",
            "peer-reviewed",
            "publication",
        ],
    ),
    (
        "industry",
        &[
            "startup",
            "funding",
            "investment",
            "acquisition",
            "partnership",
            "enterprise",
            "business",
            "market",
            "valuation",
        ],
    ),
    (
        "hardware",
        &[
            "gpu",
            "tpu",
            "chip",
            "nvidia",
            "semiconductor",
            "hardware",
            "processor",
            "computing power",
            "inference",
        ],
    ),
];

/// Keyword category for an article, by literal substring match over title and description.
pub fn categorize(title: &str, description: &str) -> &'static str {
    let text = format!("{title} {description}").to_lowercase();

    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}
