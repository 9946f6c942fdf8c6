use std::collections::BTreeSet;

use nd_core::{Article, ConsolidatedStory, Error, Result};

use super::grouper::Cluster;

#[derive(Debug, Clone, Copy, Default)]
pub struct StoryConsolidator;

impl StoryConsolidator {
    pub fn new() -> Self {
        Self
    }

    /// Turn one cluster into a story. Pure: the same cluster and batch always
    /// give the same story.
    pub fn consolidate(&self, cluster: &Cluster, batch: &[Article]) -> Result<ConsolidatedStory> {
        if let Some(&out_of_range) = cluster.members().iter().find(|&&i| i >= batch.len()) {
            return Err(Error::Dedup(format!(
                "cluster member {} outside batch of {}",
                out_of_range,
                batch.len()
            )));
        }

        let representative_index = self.select_representative(cluster, batch)?;
        let representative = &batch[representative_index];

        let mut all_source_urls = vec![representative.url.clone()];
        for &i in cluster.members() {
            if i != representative_index && !all_source_urls.contains(&batch[i].url) {
                all_source_urls.push(batch[i].url.clone());
            }
        }

        let source_names: BTreeSet<String> = cluster
            .members()
            .iter()
            .map(|&i| batch[i].source_name.clone())
            .collect();

        let is_consolidated = cluster.len() > 1;
        let consolidation_reason = if is_consolidated {
            format!("Similar story found across {} sources", cluster.len())
        } else {
            String::new()
        };

        Ok(ConsolidatedStory {
            canonical_title: representative.title.clone(),
            canonical_body: representative.body_text.clone(),
            canonical_url: representative.url.clone(),
            canonical_source: representative.source_name.clone(),
            published_at: representative.published_at,
            category_hint: representative.category_hint.clone(),
            all_source_urls,
            source_names,
            is_consolidated,
            consolidation_reason,
            original_article_count: cluster.len(),
        })
    }

    /// Longest body wins; ties go to the earliest publication, then the lowest
    /// batch index.
    pub fn select_representative(&self, cluster: &Cluster, batch: &[Article]) -> Result<usize> {
        cluster
            .members()
            .iter()
            .copied()
            .filter(|&i| i < batch.len())
            .min_by(|&a, &b| {
                let (left, right) = (&batch[a], &batch[b]);
                right
                    .body_text
                    .chars()
                    .count()
                    .cmp(&left.body_text.chars().count())
                    .then_with(|| left.published_at.cmp(&right.published_at))
                    .then_with(|| a.cmp(&b))
            })
            .ok_or_else(|| Error::Dedup("cannot consolidate an empty cluster".to_string()))
    }
}
