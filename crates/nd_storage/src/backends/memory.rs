use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nd_core::{NewsletterRecord, NewsletterStore, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local store, lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Vec<NewsletterRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NewsletterStore for MemoryStore {
    async fn save_newsletter(&self, record: &NewsletterRecord) -> Result<String> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        } else {
            records.push(record.clone());
        }
        Ok(record.id.clone())
    }

    async fn get_newsletter(&self, id: &str) -> Result<Option<NewsletterRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn list_newsletters(&self) -> Result<Vec<NewsletterRecord>> {
        let mut records = self.records.read().await.clone();
        crate::newest_first(&mut records);
        Ok(records)
    }

    async fn mark_sent(&self, id: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.email_sent = true;
                record.email_sent_at = Some(sent_at);
                true
            }
            None => false,
        })
    }

    async fn delete_newsletter(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}
