use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "newsletter_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "default_feed_category")]
    pub category: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// CSS selector for article links on the listing page.
    #[serde(default)]
    pub link_selector: Option<String>,
}

impl FeedSource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            category: default_feed_category(),
            enabled: true,
            link_selector: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    /// Lower sorts first in the newsletter.
    pub priority: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Category {
    fn new(id: &str, name: &str, emoji: &str, priority: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            emoji: emoji.to_string(),
            priority,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// Connected components of the similarity graph: A~B and B~C merges A, B and C.
    #[default]
    Transitive,
    /// Every member must be similar to every other member.
    Clique,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
    pub max_features: usize,
    /// Only this many leading characters of the body are vectorized.
    pub max_body_chars: Option<usize>,
    pub stop_words: bool,
    pub mode: GroupingMode,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            max_features: 1000,
            max_body_chars: Some(500),
            stop_words: true,
            mode: GroupingMode::Transitive,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(Error::InvalidThreshold(self.similarity_threshold));
        }
        if self.max_features == 0 {
            return Err(Error::InvalidConfig("max_features must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsletterConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// Empty means every enabled feed.
    pub feed_ids: Vec<String>,
    /// Empty means every enabled category.
    pub category_ids: Vec<String>,
    pub max_stories: usize,
    pub max_stories_to_summarize: usize,
    pub schedule_time: String,
    pub schedule_enabled: bool,
    pub recipients: Vec<String>,
    pub feeds: Vec<FeedSource>,
    pub categories: Vec<Category>,
    pub dedup: DedupConfig,
}

impl Default for NewsletterConfig {
    fn default() -> Self {
        Self {
            id: "default_ai_newsletter".to_string(),
            name: "AI Daily Newsletter".to_string(),
            description: "Daily AI and technology news digest".to_string(),
            enabled: true,
            feed_ids: Vec::new(),
            category_ids: Vec::new(),
            max_stories: 12,
            max_stories_to_summarize: 15,
            schedule_time: "07:00".to_string(),
            schedule_enabled: true,
            recipients: Vec::new(),
            feeds: default_feeds(),
            categories: default_categories(),
            dedup: DedupConfig::default(),
        }
    }
}

impl NewsletterConfig {
    /// Load from `path`, falling back to the built-in defaults when the file
    /// does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), name = %config.name, "Loaded newsletter config");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            let backup = path.with_extension("json.backup");
            if let Err(e) = std::fs::copy(path, &backup) {
                warn!(error = %e, "Failed to back up config before saving");
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.dedup.validate()?;
        if self.max_stories == 0 {
            return Err(Error::InvalidConfig("max_stories must be at least 1".to_string()));
        }
        if self.max_stories_to_summarize == 0 {
            return Err(Error::InvalidConfig(
                "max_stories_to_summarize must be at least 1".to_string(),
            ));
        }
        self.schedule_time()?;
        Ok(())
    }

    pub fn schedule_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.schedule_time, "%H:%M").map_err(|e| {
            Error::InvalidConfig(format!("schedule_time {:?}: {}", self.schedule_time, e))
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_feed_category() -> String {
    crate::types::DEFAULT_CATEGORY.to_string()
}

pub fn default_feeds() -> Vec<FeedSource> {
    [
        ("techcrunch_ai", "TechCrunch AI", "https://techcrunch.com/category/artificial-intelligence/"),
        ("mit_news_ai", "MIT News AI/ML", "https://news.mit.edu/topic/artificial-intelligence2"),
        ("ai_news", "AI News", "https://artificialintelligence-news.com/"),
        ("mit_tech_review", "MIT Tech Review", "https://www.technologyreview.com/topic/artificial-intelligence/"),
        ("venturebeat_ai", "VentureBeat AI", "https://venturebeat.com/ai/"),
        ("wired_ai", "Wired AI", "https://www.wired.com/tag/artificial-intelligence/"),
        ("forbes_ai", "Forbes AI", "https://www.forbes.com/ai/"),
        ("openai_blog", "OpenAI Blog", "https://openai.com/blog/"),
        ("sciencedaily_ai", "ScienceDaily AI", "https://www.sciencedaily.com/news/computers_math/artificial_intelligence/"),
        ("verge_ai", "The Verge AI", "https://www.theverge.com/ai-artificial-intelligence"),
    ]
    .into_iter()
    .map(|(id, name, url)| FeedSource::new(id, name, url))
    .collect()
}

pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("ai_policy", "AI Policy", "⚖️", 1),
        Category::new("ai_business", "AI Business", "💼", 2),
        Category::new("ai_research", "AI Research", "🔬", 3),
        Category::new("ai_products", "AI Products", "🚀", 4),
        Category::new("machine_learning", "Machine Learning", "🤖", 5),
        Category::new("robotics", "Robotics", "🦾", 6),
        Category::new("tech_industry", "Tech Industry", "💻", 7),
        Category::new("other", "Other", "📰", 999),
    ]
}
