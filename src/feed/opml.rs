use std::path::Path;

use opml::{Outline, OPML};

use crate::error::Result;
use crate::models::NewSource;

pub fn parse_opml_file(path: &Path) -> Result<Vec<NewSource>> {
    let content = std::fs::read_to_string(path)?;
    parse_opml(&content)
}

/// Collects every outline with an `xmlUrl`, descending into folders.
pub fn parse_opml(content: &str) -> Result<Vec<NewSource>> {
    let document = OPML::from_str(content)?;
    let mut sources = Vec::new();
    collect(&document.body.outlines, &mut sources);
    Ok(sources)
}

fn collect(outlines: &[Outline], sources: &mut Vec<NewSource>) {
    for outline in outlines {
        if let Some(url) = outline.xml_url.as_ref().filter(|u| !u.trim().is_empty()) {
            let name = outline
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| outline.text.clone());
            sources.push(NewSource {
                name,
                url: url.trim().to_string(),
            });
        }
        collect(&outline.outlines, sources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_outlines_are_flattened() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline text="AI">
      <outline text="MIT News AI" type="rss" xmlUrl="https://news.mit.edu/rss/topic/artificial-intelligence2"/>
      <outline text="ignored" title="The Gradient" type="rss" xmlUrl="https://thegradient.pub/rss/"/>
    </outline>
    <outline text="No feed here"/>
  </body>
</opml>"#;

        let sources = parse_opml(xml).unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "MIT News AI");
        assert_eq!(sources[1].name, "The Gradient");
        assert_eq!(sources[1].url, "https://thegradient.pub/rss/");
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(parse_opml("<not-opml>").is_err());
    }
}
