pub mod dedup;
pub mod models;

pub use dedup::{DedupStats, StoryDeduplicator};
pub use models::{create_summarizer, ModelKind};

#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelKind,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelKind::Extractive,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model_name: None,
            base_url: None,
        }
    }
}

pub mod prelude {
    pub use super::dedup::{Cluster, FeatureVector, SimilarityGrouper, StoryConsolidator, TfidfVectorizer};
    pub use super::models::create_summarizer;
    pub use super::{Config, StoryDeduplicator};
    pub use nd_core::{Article, ConsolidatedStory, Error, Result, Summary};
}
