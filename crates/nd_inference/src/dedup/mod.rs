//! Story deduplication: vectorize a batch, group near-duplicates, and fold
//! each group into one consolidated story.

use std::collections::BTreeMap;

use nd_core::{Article, ConsolidatedStory, DedupConfig, Result};
use serde::Serialize;
use tracing::{debug, info};

pub mod consolidator;
pub mod grouper;
mod stop_words;
pub mod vectorizer;

pub use consolidator::StoryConsolidator;
pub use grouper::{cosine_similarity, Cluster, SimilarityGrouper, SimilarityMatrix};
pub use vectorizer::{preprocess, FeatureVector, TfidfVectorizer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupStats {
    pub total_articles: usize,
    pub unique_stories: usize,
    pub duplicates_removed: usize,
    pub consolidation_rate: f64,
    pub consolidated_stories: usize,
    pub source_distribution: BTreeMap<String, usize>,
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct StoryDeduplicator {
    threshold: f64,
    vectorizer: TfidfVectorizer,
    grouper: SimilarityGrouper,
    consolidator: StoryConsolidator,
}

impl StoryDeduplicator {
    pub fn new(config: &DedupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            threshold: config.similarity_threshold,
            vectorizer: TfidfVectorizer::from_config(config),
            grouper: SimilarityGrouper::new(config.mode),
            consolidator: StoryConsolidator::new(),
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Clusters of `articles` at the configured threshold.
    pub fn clusters(&self, articles: &[Article]) -> Result<Vec<Cluster>> {
        let vectors = self.vectorizer.fit_transform(articles);
        self.grouper.group(&vectors, self.threshold)
    }

    pub fn deduplicate(&self, articles: &[Article]) -> Result<Vec<ConsolidatedStory>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        info!(articles = articles.len(), threshold = self.threshold, "Starting deduplication");
        let clusters = self.clusters(articles)?;
        debug!(clusters = clusters.len(), "Grouped articles");

        let stories = clusters
            .iter()
            .map(|cluster| self.consolidator.consolidate(cluster, articles))
            .collect::<Result<Vec<_>>>()?;

        info!(
            articles = articles.len(),
            stories = stories.len(),
            "Consolidated articles into unique stories"
        );
        Ok(stories)
    }

    pub fn statistics(&self, articles: &[Article], stories: &[ConsolidatedStory]) -> DedupStats {
        let total_articles = articles.len();
        let unique_stories = stories.len();
        let duplicates_removed = total_articles.saturating_sub(unique_stories);

        let mut source_distribution = BTreeMap::new();
        for article in articles {
            *source_distribution.entry(article.source_name.clone()).or_insert(0) += 1;
        }

        DedupStats {
            total_articles,
            unique_stories,
            duplicates_removed,
            consolidation_rate: if total_articles > 0 {
                duplicates_removed as f64 / total_articles as f64
            } else {
                0.0
            },
            consolidated_stories: stories.iter().filter(|s| s.is_consolidated).count(),
            source_distribution,
            similarity_threshold: self.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_threshold() {
        let config = DedupConfig {
            similarity_threshold: 0.0,
            ..DedupConfig::default()
        };
        assert!(StoryDeduplicator::new(&config).is_err());
    }

    #[test]
    fn test_statistics() {
        let dedup = StoryDeduplicator::new(&DedupConfig::default()).unwrap();
        let articles = vec![
            Article::new("Wired AI", "https://wired.com/1", "Chipmaker unveils accelerator", "The accelerator doubles throughput for model training."),
            Article::new("The Verge AI", "https://verge.com/1", "Chipmaker unveils accelerator", "The accelerator doubles throughput for model training."),
            Article::new("Wired AI", "https://wired.com/2", "Senate debates robotics bill", "Lawmakers weigh rules for warehouse automation."),
        ];
        let stories = dedup.deduplicate(&articles).unwrap();
        let stats = dedup.statistics(&articles, &stories);

        assert_eq!(stats.total_articles, 3);
        assert_eq!(stats.unique_stories, 2);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.consolidated_stories, 1);
        assert_eq!(stats.source_distribution["Wired AI"], 2);
        assert!((stats.consolidation_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_statistics() {
        let dedup = StoryDeduplicator::new(&DedupConfig::default()).unwrap();
        let stats = dedup.statistics(&[], &[]);
        assert_eq!(stats.consolidation_rate, 0.0);
        assert_eq!(stats.unique_stories, 0);
    }
}
