//! In-process collaborators for driving the orchestrator without a network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nd_core::{
    Article, ArticleSource, ConsolidatedStory, Error, FeedSource, NewsletterConfig, NewsletterRecord,
    NewsletterStore, Notifier, RenderRequest, RenderedNewsletter, Renderer, Result, Summarizer, Summary,
};
use nd_pipeline::{Collaborators, ConcurrencyGate, PipelineOrchestrator, TemplateRenderer};
use nd_storage::MemoryStore;
use tokio::sync::Notify;

pub const BODY_A: &str = "OpenAI on Tuesday unveiled a reasoning model designed to accelerate scientific discovery. \
The model solves graduate level chemistry and physics problems, according to benchmark results shared with researchers. \
Early access partners include national laboratories and university groups.";

pub const BODY_B: &str = "OpenAI on Tuesday unveiled a reasoning model designed to accelerate scientific discovery. \
The model solves graduate level chemistry and biology problems, according to benchmark results published with researchers. \
Early access partners include national laboratories and hospital groups.";

pub fn feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("techcrunch", "TechCrunch AI", "https://techcrunch.com/ai"),
        FeedSource::new("verge", "The Verge AI", "https://theverge.com/ai"),
        FeedSource::new("wired", "Wired AI", "https://wired.com/ai"),
    ]
}

/// A and B report the same story, C is unrelated.
pub fn scenario_articles() -> HashMap<String, Vec<Article>> {
    HashMap::from([
        (
            "techcrunch".to_string(),
            vec![Article::new(
                "TechCrunch AI",
                "https://techcrunch.com/openai-reasoning",
                "OpenAI unveils reasoning model for scientific discovery",
                BODY_A,
            )],
        ),
        (
            "verge".to_string(),
            vec![Article::new(
                "The Verge AI",
                "https://theverge.com/openai-reasoning",
                "OpenAI unveils reasoning model for scientific discovery",
                BODY_B,
            )],
        ),
        (
            "wired".to_string(),
            vec![Article::new(
                "Wired AI",
                "https://wired.com/warehouse-robots",
                "Warehouse robots get new safety rules",
                "Regulators proposed safety standards for autonomous forklifts operating alongside human workers.",
            )],
        ),
    ])
}

pub fn config() -> NewsletterConfig {
    let mut config = NewsletterConfig::default();
    config.feeds = feeds();
    config.recipients = vec!["reader@example.com".to_string()];
    config.dedup.similarity_threshold = 0.7;
    config
}

/// Returns the articles registered for each feed id; a feed without an
/// entry is unreachable.
#[derive(Default)]
pub struct FakeSource {
    pub articles: HashMap<String, Vec<Article>>,
    pub calls: AtomicUsize,
    /// When set, the first fetch signals `entered` and waits for `resume`.
    pub hold: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeSource {
    pub fn new(articles: HashMap<String, Vec<Article>>) -> Self {
        Self {
            articles,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleSource for FakeSource {
    async fn fetch_articles(&self, feed: &FeedSource) -> Result<Vec<Article>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let (0, Some((entered, resume))) = (call, &self.hold) {
            entered.notify_one();
            resume.notified().await;
        }
        self.articles
            .get(&feed.id)
            .cloned()
            .ok_or_else(|| Error::source_unavailable(&feed.name, "connection refused"))
    }
}

#[derive(Debug, Default)]
pub struct FakeSummarizer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeSummarizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn summarize(&self, story: &ConsolidatedStory, _allowed: &[String]) -> Result<Summary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::EnrichmentUnavailable("rate limited".to_string()));
        }
        Ok(Summary {
            summary_text: format!("About {}", story.canonical_title),
            key_points: vec![story.canonical_title.clone()],
            impact_score: if story.is_consolidated { 8 } else { 6 },
            category_label: "AI Research".to_string(),
        })
    }
}

#[derive(Default)]
pub struct FakeRenderer {
    pub fail: bool,
    pub calls: AtomicUsize,
    inner: TemplateRenderer,
}

impl FakeRenderer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, request: RenderRequest<'_>) -> Result<RenderedNewsletter> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Render("template missing".to_string()));
        }
        self.inner.render(request)
    }
}

/// Memory store that can be told to reject writes.
#[derive(Default)]
pub struct FakeStore {
    pub fail_save: bool,
    pub fail_mark: bool,
    pub saves: AtomicUsize,
    pub inner: MemoryStore,
}

impl FakeStore {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsletterStore for FakeStore {
    async fn save_newsletter(&self, record: &NewsletterRecord) -> Result<String> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save {
            return Err(Error::Persist("disk full".to_string()));
        }
        self.inner.save_newsletter(record).await
    }

    async fn get_newsletter(&self, id: &str) -> Result<Option<NewsletterRecord>> {
        self.inner.get_newsletter(id).await
    }

    async fn list_newsletters(&self) -> Result<Vec<NewsletterRecord>> {
        self.inner.list_newsletters().await
    }

    async fn mark_sent(&self, id: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        if self.fail_mark {
            return Err(Error::Persist("read-only store".to_string()));
        }
        self.inner.mark_sent(id, sent_at).await
    }

    async fn delete_newsletter(&self, id: &str) -> Result<bool> {
        self.inner.delete_newsletter(id).await
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub fail: bool,
    pub deliveries: AtomicUsize,
}

impl FakeNotifier {
    pub fn deliveries(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    fn name(&self) -> &str {
        "fake-mail"
    }

    async fn deliver(&self, _newsletter: &RenderedNewsletter, _recipients: &[String]) -> Result<()> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Notify("smtp down".to_string()));
        }
        Ok(())
    }
}

/// Handles to every collaborator of an orchestrator under test.
pub struct Harness {
    pub gate: Arc<ConcurrencyGate>,
    pub source: Arc<FakeSource>,
    pub summarizer: Arc<FakeSummarizer>,
    pub renderer: Arc<FakeRenderer>,
    pub store: Arc<FakeStore>,
    pub notifier: Arc<FakeNotifier>,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            gate: Arc::new(ConcurrencyGate::new()),
            source: Arc::new(FakeSource::new(scenario_articles())),
            summarizer: Arc::new(FakeSummarizer::default()),
            renderer: Arc::new(FakeRenderer::default()),
            store: Arc::new(FakeStore::default()),
            notifier: Arc::new(FakeNotifier::default()),
        }
    }
}

impl Harness {
    pub fn orchestrator(&self, config: NewsletterConfig) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            config,
            Arc::clone(&self.gate),
            Collaborators {
                source: self.source.clone(),
                summarizer: self.summarizer.clone(),
                renderer: self.renderer.clone(),
                store: self.store.clone(),
                notifier: Some(self.notifier.clone()),
            },
        )
        .expect("valid test config")
    }

    /// No collaborator has been invoked.
    pub fn untouched(&self) -> bool {
        self.source.calls() == 0
            && self.summarizer.calls() == 0
            && self.renderer.calls() == 0
            && self.store.saves() == 0
            && self.notifier.deliveries() == 0
    }
}
