use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{EnrichedStory, RenderedNewsletter};
use crate::Result;

/// Input to a [`Renderer`]. Stories arrive already ordered by category then
/// impact score, highest first.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub title: &'a str,
    pub stories: &'a [EnrichedStory],
    pub generated_at: DateTime<Utc>,
}

pub trait Renderer: Send + Sync {
    fn render(&self, request: RenderRequest<'_>) -> Result<RenderedNewsletter>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, newsletter: &RenderedNewsletter, recipients: &[String]) -> Result<()>;
}
