use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::NewsletterRecord;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_newsletters: usize,
    pub sent_newsletters: usize,
    pub total_stories: usize,
    pub latest_created_at: Option<DateTime<Utc>>,
}

impl StoreStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a NewsletterRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut stats, record| {
            stats.total_newsletters += 1;
            stats.total_stories += record.story_count;
            if record.email_sent {
                stats.sent_newsletters += 1;
            }
            if stats.latest_created_at.map_or(true, |latest| record.created_at > latest) {
                stats.latest_created_at = Some(record.created_at);
            }
            stats
        })
    }
}

#[async_trait]
pub trait NewsletterStore: Send + Sync {
    /// Store a newsletter and return its identifier
    async fn save_newsletter(&self, record: &NewsletterRecord) -> Result<String>;

    async fn get_newsletter(&self, id: &str) -> Result<Option<NewsletterRecord>>;

    /// All newsletters, newest first
    async fn list_newsletters(&self) -> Result<Vec<NewsletterRecord>>;

    /// Returns false when no newsletter has that id
    async fn mark_sent(&self, id: &str, sent_at: DateTime<Utc>) -> Result<bool>;

    async fn delete_newsletter(&self, id: &str) -> Result<bool>;

    async fn stats(&self) -> Result<StoreStats> {
        let records = self.list_newsletters().await?;
        Ok(StoreStats::from_records(&records))
    }
}
