use std::fmt;

use async_trait::async_trait;
use nd_core::{ConsolidatedStory, Result, Summarizer, Summary, DEFAULT_CATEGORY, NEUTRAL_IMPACT};

const SUMMARY_WORDS: usize = 40;

/// Offline summarizer: leading words of the body, first sentences as key
/// points, and an impact score that grows with the number of sources.
pub struct ExtractiveSummarizer;

impl fmt::Debug for ExtractiveSummarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractiveSummarizer").finish()
    }
}

impl ExtractiveSummarizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    fn name(&self) -> &str {
        "Extractive"
    }

    async fn summarize(&self, story: &ConsolidatedStory, allowed_categories: &[String]) -> Result<Summary> {
        let words: Vec<&str> = story.canonical_body.split_whitespace().take(SUMMARY_WORDS).collect();
        let summary_text = if words.is_empty() {
            story.canonical_title.clone()
        } else {
            words.join(" ")
        };

        let key_points = story
            .canonical_body
            .split_terminator('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(3)
            .map(|s| format!("{}.", s))
            .collect();

        let extra_sources = story.original_article_count.saturating_sub(1).min(3) as u8;

        let category_label = story
            .category_hint
            .as_deref()
            .filter(|hint| allowed_categories.iter().any(|c| c == hint))
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();

        Ok(Summary {
            summary_text,
            key_points,
            impact_score: NEUTRAL_IMPACT + extra_sources,
            category_label,
        })
    }
}
