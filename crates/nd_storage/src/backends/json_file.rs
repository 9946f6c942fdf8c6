use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nd_core::{NewsletterRecord, NewsletterStore, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Newsletters kept in a single JSON document on disk. Every mutation
/// rewrites the file through a temporary sibling and a rename; the in-memory
/// copy only changes once that write succeeded.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<Vec<NewsletterRecord>>,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!("📂 Opened newsletter store {} ({} newsletters)", path.display(), records.len());
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[NewsletterRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Wrote {} newsletters to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl NewsletterStore for JsonFileStore {
    async fn save_newsletter(&self, record: &NewsletterRecord) -> Result<String> {
        let mut records = self.records.lock().await;
        let mut staged = records.clone();
        if let Some(existing) = staged.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        } else {
            staged.push(record.clone());
        }
        self.persist(&staged).await?;
        *records = staged;
        Ok(record.id.clone())
    }

    async fn get_newsletter(&self, id: &str) -> Result<Option<NewsletterRecord>> {
        let records = self.records.lock().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn list_newsletters(&self) -> Result<Vec<NewsletterRecord>> {
        let mut records = self.records.lock().await.clone();
        crate::newest_first(&mut records);
        Ok(records)
    }

    async fn mark_sent(&self, id: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let mut records = self.records.lock().await;
        let mut staged = records.clone();
        let Some(record) = staged.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        record.email_sent = true;
        record.email_sent_at = Some(sent_at);
        self.persist(&staged).await?;
        *records = staged;
        Ok(true)
    }

    async fn delete_newsletter(&self, id: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        let mut staged = records.clone();
        staged.retain(|r| r.id != id);
        if staged.len() == records.len() {
            return Ok(false);
        }
        self.persist(&staged).await?;
        *records = staged;
        Ok(true)
    }
}
