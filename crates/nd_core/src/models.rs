use std::fmt;

use async_trait::async_trait;

use crate::types::{ConsolidatedStory, Summary};
use crate::Result;

#[async_trait]
pub trait Summarizer: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Summarize one consolidated story. `allowed_categories` is the category
    /// vocabulary for the current run; anything else must come back as `Other`.
    async fn summarize(&self, story: &ConsolidatedStory, allowed_categories: &[String]) -> Result<Summary>;
}
