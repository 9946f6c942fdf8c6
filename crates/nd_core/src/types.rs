use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category assigned to stories the summarizer could not (or would not) place.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Impact score used when no summarizer verdict is available.
pub const NEUTRAL_IMPACT: u8 = 5;

/// A single scraped article. Produced by an [`crate::ArticleSource`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub source_name: String,
    pub url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub body_text: String,
    pub category_hint: Option<String>,
}

impl Article {
    pub fn new(
        source_name: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        body_text: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            url: url.into(),
            title: title.into(),
            published_at: Utc::now(),
            body_text: body_text.into(),
            category_hint: None,
        }
    }

    pub fn published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = published_at;
        self
    }

    pub fn with_category_hint(mut self, hint: impl Into<String>) -> Self {
        self.category_hint = Some(hint.into());
        self
    }
}

/// One story per cluster of near-duplicate articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedStory {
    pub canonical_title: String,
    pub canonical_body: String,
    pub canonical_url: String,
    pub canonical_source: String,
    pub published_at: DateTime<Utc>,
    pub category_hint: Option<String>,
    /// Representative URL first, then the other members in batch order.
    pub all_source_urls: Vec<String>,
    pub source_names: BTreeSet<String>,
    pub is_consolidated: bool,
    /// Empty unless `is_consolidated`.
    pub consolidation_reason: String,
    pub original_article_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary_text: String,
    pub key_points: Vec<String>,
    pub impact_score: u8,
    pub category_label: String,
}

impl Summary {
    /// Builds the neutral summary used when the summarizer fails for `story`:
    /// title plus the first sentence of the body, default category, neutral impact.
    pub fn fallback_for(story: &ConsolidatedStory) -> Self {
        let title = if story.canonical_title.trim().is_empty() {
            "No title available"
        } else {
            story.canonical_title.trim()
        };

        let first_sentence: String = story
            .canonical_body
            .split('.')
            .next()
            .map(|s| s.trim().chars().take(200).collect())
            .filter(|s: &String| !s.is_empty())
            .unwrap_or_else(|| "No content available".to_string());

        let key_points = if story.canonical_title.trim().is_empty() {
            Vec::new()
        } else {
            vec![title.to_string()]
        };

        Self {
            summary_text: format!("{}. {}.", title, first_sentence),
            key_points,
            impact_score: NEUTRAL_IMPACT,
            category_label: DEFAULT_CATEGORY.to_string(),
        }
    }
}

/// Outcome of the summarizing stage for one story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "summary", rename_all = "snake_case")]
pub enum Enrichment {
    Enriched(Summary),
    Fallback(Summary),
}

impl Enrichment {
    pub fn summary(&self) -> &Summary {
        match self {
            Enrichment::Enriched(s) | Enrichment::Fallback(s) => s,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Enrichment::Fallback(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedStory {
    pub story: ConsolidatedStory,
    pub enrichment: Enrichment,
}

impl EnrichedStory {
    pub fn impact_score(&self) -> u8 {
        self.enrichment.summary().impact_score
    }

    pub fn category(&self) -> &str {
        &self.enrichment.summary().category_label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Manual,
    Scheduled,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Manual => write!(f, "manual"),
            TriggerKind::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// The three renderings of one newsletter issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedNewsletter {
    pub title: String,
    pub html: String,
    pub markdown: String,
    pub text: String,
    pub story_count: usize,
}

/// What the store keeps for each generated issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsletterRecord {
    pub id: String,
    pub title: String,
    pub html_content: String,
    pub markdown_content: String,
    pub text_content: String,
    pub story_count: usize,
    pub created_at: DateTime<Utc>,
    pub generation_method: TriggerKind,
    pub config_id: Option<String>,
    pub config_name: Option<String>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub error_reason: Option<String>,
}

impl NewsletterRecord {
    pub fn from_rendered(
        rendered: &RenderedNewsletter,
        generation_method: TriggerKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::id_for(created_at),
            title: rendered.title.clone(),
            html_content: rendered.html.clone(),
            markdown_content: rendered.markdown.clone(),
            text_content: rendered.text.clone(),
            story_count: rendered.story_count,
            created_at,
            generation_method,
            config_id: None,
            config_name: None,
            email_sent: false,
            email_sent_at: None,
            error_reason: None,
        }
    }

    /// Timestamp based identifier, millisecond resolution.
    pub fn id_for(created_at: DateTime<Utc>) -> String {
        created_at.format("%Y%m%d_%H%M%S_%3f").to_string()
    }
}
