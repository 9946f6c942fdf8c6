pub mod config;
pub mod delivery;
pub mod error;
pub mod models;
pub mod source;
pub mod storage;
pub mod types;

pub use config::{Category, DedupConfig, FeedSource, GroupingMode, NewsletterConfig};
pub use delivery::{Notifier, RenderRequest, Renderer};
pub use error::{Error, Result};
pub use models::Summarizer;
pub use source::ArticleSource;
pub use storage::{NewsletterStore, StoreStats};
pub use types::{
    Article, ConsolidatedStory, EnrichedStory, Enrichment, NewsletterRecord, RenderedNewsletter,
    Summary, TriggerKind, DEFAULT_CATEGORY, NEUTRAL_IMPACT,
};
