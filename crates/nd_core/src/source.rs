use async_trait::async_trait;

use crate::config::FeedSource;
use crate::types::Article;
use crate::Result;

#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Fetch the current articles of one feed. An `Err` means the whole
    /// source was unreachable; individual bad articles are skipped instead.
    async fn fetch_articles(&self, feed: &FeedSource) -> Result<Vec<Article>>;
}
