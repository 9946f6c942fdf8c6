//! The scrape → dedupe → summarize → render → persist → notify run, guarded
//! by the shared [`ConcurrencyGate`].

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nd_core::{
    Article, ArticleSource, ConsolidatedStory, EnrichedStory, Enrichment, NewsletterConfig, NewsletterRecord,
    NewsletterStore, Notifier, RenderRequest, RenderedNewsletter, Renderer, Result, Summarizer, Summary, TriggerKind,
};
use nd_inference::{DedupStats, StoryDeduplicator};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::gate::ConcurrencyGate;
use crate::render::error_newsletter;
use crate::selection::{resolve_selection, RunSelection};

const HIGH_IMPACT: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    AcquiringGate,
    Scraping,
    Deduplicating,
    Summarizing,
    Rendering,
    Persisting,
    Notifying,
    Done,
    Skipped,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AcquiringGate => "ACQUIRING_GATE",
            Stage::Scraping => "SCRAPING",
            Stage::Deduplicating => "DEDUPLICATING",
            Stage::Summarizing => "SUMMARIZING",
            Stage::Rendering => "RENDERING",
            Stage::Persisting => "PERSISTING",
            Stage::Notifying => "NOTIFYING",
            Stage::Done => "DONE",
            Stage::Skipped => "SKIPPED",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Reached DONE with no recorded faults.
    Success,
    /// Reached DONE with at least one recorded fault.
    Partial,
    Failed,
    SkippedLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    SourceUnavailable,
    NoArticles,
    EnrichmentUnavailable,
    DedupFault,
    RenderFault,
    PersistFault,
    NotifyFault,
}

impl FaultKind {
    pub fn is_fatal(self) -> bool {
        matches!(self, FaultKind::DedupFault | FaultKind::RenderFault | FaultKind::PersistFault)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::SourceUnavailable => "source unavailable",
            FaultKind::NoArticles => "no articles",
            FaultKind::EnrichmentUnavailable => "enrichment unavailable",
            FaultKind::DedupFault => "dedup fault",
            FaultKind::RenderFault => "render fault",
            FaultKind::PersistFault => "persist fault",
            FaultKind::NotifyFault => "notify fault",
        };
        f.write_str(name)
    }
}

/// A fault recorded during a run. Fatal kinds end the run in FAILED.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{stage} {kind}: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub kind: FaultKind,
    /// Source name or story title the fault concerns.
    pub subject: Option<String>,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, kind: FaultKind, subject: Option<String>, message: impl fmt::Display) -> Self {
        Self {
            stage,
            kind,
            subject,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentStats {
    pub total: usize,
    pub enriched: usize,
    pub fallback: usize,
    pub average_impact: f64,
    pub high_impact: usize,
}

impl EnrichmentStats {
    pub fn from_stories(stories: &[EnrichedStory]) -> Self {
        let total = stories.len();
        let fallback = stories.iter().filter(|s| s.enrichment.is_fallback()).count();
        let impact_sum: u32 = stories.iter().map(|s| u32::from(s.impact_score())).sum();
        Self {
            total,
            enriched: total - fallback,
            fallback,
            average_impact: if total > 0 { f64::from(impact_sum) / total as f64 } else { 0.0 },
            high_impact: stories.iter().filter(|s| s.impact_score() >= HIGH_IMPACT).count(),
        }
    }
}

/// Report of one pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub trigger_kind: TriggerKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_stage: Stage,
    pub stage_errors: Vec<StageError>,
    pub terminal_status: Option<RunStatus>,
    pub newsletter_id: Option<String>,
    pub story_count: usize,
    pub email_sent: bool,
    pub dedup_stats: Option<DedupStats>,
    pub enrichment_stats: Option<EnrichmentStats>,
}

impl PipelineRun {
    fn new(trigger_kind: TriggerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger_kind,
            started_at: Utc::now(),
            finished_at: None,
            current_stage: Stage::AcquiringGate,
            stage_errors: Vec::new(),
            terminal_status: None,
            newsletter_id: None,
            story_count: 0,
            email_sent: false,
            dedup_stats: None,
            enrichment_stats: None,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(run = %self.id, trigger = %self.trigger_kind, stage = %stage, "Entering stage");
        self.current_stage = stage;
    }

    fn record(&mut self, fault: StageError) {
        warn!(
            run = %self.id,
            stage = %fault.stage,
            kind = %fault.kind,
            subject = fault.subject.as_deref().unwrap_or("-"),
            "{}",
            fault.message
        );
        self.stage_errors.push(fault);
    }

    fn finish(&mut self, stage: Stage, status: RunStatus) {
        self.current_stage = stage;
        self.terminal_status = Some(status);
        self.finished_at = Some(Utc::now());
    }

    pub fn status(&self) -> Option<RunStatus> {
        self.terminal_status
    }

    pub fn is_done(&self) -> bool {
        self.current_stage == Stage::Done
    }

    pub fn errors_of(&self, kind: FaultKind) -> impl Iterator<Item = &StageError> {
        self.stage_errors.iter().filter(move |e| e.kind == kind)
    }
}

/// The external collaborators a run drives, one per stage.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ArticleSource>,
    pub summarizer: Arc<dyn Summarizer>,
    pub renderer: Arc<dyn Renderer>,
    pub store: Arc<dyn NewsletterStore>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

pub struct PipelineOrchestrator {
    config: NewsletterConfig,
    gate: Arc<ConcurrencyGate>,
    deduplicator: StoryDeduplicator,
    collaborators: Collaborators,
}

impl fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config.name)
            .field("gate", &self.gate)
            .field("summarizer", &self.collaborators.summarizer)
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    pub fn new(config: NewsletterConfig, gate: Arc<ConcurrencyGate>, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let deduplicator = StoryDeduplicator::new(&config.dedup)?;
        Ok(Self {
            config,
            gate,
            deduplicator,
            collaborators,
        })
    }

    pub fn config(&self) -> &NewsletterConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        &self.gate
    }

    pub fn store(&self) -> &Arc<dyn NewsletterStore> {
        &self.collaborators.store
    }

    /// Run the full pipeline once. Returns immediately with
    /// [`RunStatus::SkippedLocked`] when another run holds the gate.
    pub async fn run(&self, trigger: TriggerKind) -> PipelineRun {
        let mut run = PipelineRun::new(trigger);
        run.enter(Stage::AcquiringGate);

        let Some(guard) = self.gate.try_acquire(trigger) else {
            match self.gate.holder() {
                Some(holder) => info!(
                    trigger = %trigger,
                    holder = %holder.trigger,
                    since = %holder.since,
                    "⏭️ Run already in progress, skipping"
                ),
                None => info!(trigger = %trigger, "⏭️ Run already in progress, skipping"),
            }
            run.finish(Stage::Skipped, RunStatus::SkippedLocked);
            return run;
        };

        info!(run = %run.id, trigger = %trigger, "🚀 Starting newsletter run");
        let outcome = self.execute(&mut run).await;
        if let Err(fault) = outcome {
            error!(run = %run.id, stage = %fault.stage, kind = %fault.kind, "❌ Run failed: {}", fault.message);
            let reason = fault.to_string();
            let archive = fault.kind != FaultKind::PersistFault;
            run.stage_errors.push(fault);
            if archive {
                self.save_error_record(&mut run, &reason).await;
            }
            guard.release();
            run.finish(Stage::Failed, RunStatus::Failed);
            return run;
        }
        guard.release();

        let status = if run.stage_errors.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        };
        run.finish(Stage::Done, status);
        info!(
            run = %run.id,
            stories = run.story_count,
            faults = run.stage_errors.len(),
            newsletter = run.newsletter_id.as_deref().unwrap_or("-"),
            "✅ Run finished"
        );
        run
    }

    /// A failed run still leaves an "(Error)" entry in the archive. Runs that
    /// failed on the store itself do not try again.
    async fn save_error_record(&self, run: &mut PipelineRun, reason: &str) {
        let at = Utc::now();
        let title = format!("{} (Error)", self.title(at, false));
        let rendered = error_newsletter(&title, reason, at);
        let mut record = NewsletterRecord::from_rendered(&rendered, run.trigger_kind, at);
        record.config_id = Some(self.config.id.clone());
        record.config_name = Some(self.config.name.clone());
        record.error_reason = Some(reason.to_string());

        match self.collaborators.store.save_newsletter(&record).await {
            Ok(id) => {
                info!(newsletter = %id, "💾 Error record saved");
                run.newsletter_id = Some(id);
            }
            Err(e) => run.record(StageError::new(
                Stage::Persisting,
                FaultKind::PersistFault,
                Some(record.id.clone()),
                e,
            )),
        }
    }

    async fn execute(&self, run: &mut PipelineRun) -> std::result::Result<(), StageError> {
        let selection = resolve_selection(&self.config);

        run.enter(Stage::Scraping);
        let articles = self.scrape(&selection, run).await;

        run.enter(Stage::Deduplicating);
        let stories = self
            .deduplicator
            .deduplicate(&articles)
            .map_err(|e| StageError::new(Stage::Deduplicating, FaultKind::DedupFault, None, e))?;
        run.dedup_stats = Some(self.deduplicator.statistics(&articles, &stories));

        run.enter(Stage::Summarizing);
        let enriched = self.summarize(stories, &selection, run).await;
        run.enrichment_stats = Some(EnrichmentStats::from_stories(&enriched));
        let enriched = select_and_order(enriched, &selection, self.config.max_stories);
        run.story_count = enriched.len();

        run.enter(Stage::Rendering);
        let generated_at = Utc::now();
        let title = self.title(generated_at, enriched.is_empty());
        let rendered = self
            .collaborators
            .renderer
            .render(RenderRequest {
                title: &title,
                stories: &enriched,
                generated_at,
            })
            .map_err(|e| StageError::new(Stage::Rendering, FaultKind::RenderFault, None, e))?;

        run.enter(Stage::Persisting);
        let mut record = NewsletterRecord::from_rendered(&rendered, run.trigger_kind, generated_at);
        record.config_id = Some(self.config.id.clone());
        record.config_name = Some(self.config.name.clone());
        record.error_reason = run
            .errors_of(FaultKind::NoArticles)
            .next()
            .map(|e| e.message.clone());
        let newsletter_id = self
            .collaborators
            .store
            .save_newsletter(&record)
            .await
            .map_err(|e| StageError::new(Stage::Persisting, FaultKind::PersistFault, Some(record.id.clone()), e))?;
        info!(newsletter = %newsletter_id, stories = rendered.story_count, "💾 Newsletter saved");
        run.newsletter_id = Some(newsletter_id.clone());

        run.enter(Stage::Notifying);
        self.notify(&rendered, &newsletter_id, run).await;

        Ok(())
    }

    /// Sources are fetched one after another; an unreachable source is
    /// recorded and skipped.
    async fn scrape(&self, selection: &RunSelection, run: &mut PipelineRun) -> Vec<Article> {
        let mut articles = Vec::new();
        let mut reachable = 0usize;

        for feed in &selection.feeds {
            match self.collaborators.source.fetch_articles(feed).await {
                Ok(fetched) => {
                    reachable += 1;
                    info!(source = %feed.name, articles = fetched.len(), "Scraped source");
                    articles.extend(fetched);
                }
                Err(e) => run.record(StageError::new(
                    Stage::Scraping,
                    FaultKind::SourceUnavailable,
                    Some(feed.name.clone()),
                    e,
                )),
            }
        }

        if articles.is_empty() {
            let message = if selection.feeds.is_empty() {
                "No sources selected".to_string()
            } else if reachable == 0 {
                "No articles found during scraping: every source was unavailable".to_string()
            } else {
                "No articles found during scraping".to_string()
            };
            run.record(StageError::new(Stage::Scraping, FaultKind::NoArticles, None, message));
        } else {
            info!(
                sources = selection.feeds.len(),
                reachable,
                articles = articles.len(),
                "Scraping finished"
            );
        }
        articles
    }

    /// Each story gets the summarizer's output or, on failure, a fallback
    /// built from its own text.
    async fn summarize(
        &self,
        mut stories: Vec<ConsolidatedStory>,
        selection: &RunSelection,
        run: &mut PipelineRun,
    ) -> Vec<EnrichedStory> {
        let limit = self.config.max_stories_to_summarize;
        if stories.len() > limit {
            info!(stories = stories.len(), limit, "Summarizing only the first stories");
            stories.truncate(limit);
        }

        let allowed = selection.allowed_categories();
        let summarizer = &self.collaborators.summarizer;
        let mut enriched = Vec::with_capacity(stories.len());
        let mut failures = 0usize;

        for (i, story) in stories.into_iter().enumerate() {
            let enrichment = match summarizer.summarize(&story, &allowed).await {
                Ok(summary) => {
                    debug!(story = i + 1, impact = summary.impact_score, "Summarized story");
                    Enrichment::Enriched(summary)
                }
                Err(e) => {
                    failures += 1;
                    run.record(StageError::new(
                        Stage::Summarizing,
                        FaultKind::EnrichmentUnavailable,
                        Some(story.canonical_title.clone()),
                        e,
                    ));
                    Enrichment::Fallback(Summary::fallback_for(&story))
                }
            };
            enriched.push(EnrichedStory { story, enrichment });
        }

        if failures > 0 && failures == enriched.len() {
            error!(
                summarizer = summarizer.name(),
                stories = failures,
                "Summarizer unavailable for every story, using fallback content"
            );
        }
        enriched
    }

    async fn notify(&self, rendered: &RenderedNewsletter, newsletter_id: &str, run: &mut PipelineRun) {
        if rendered.story_count == 0 {
            info!("Empty newsletter, not sending");
            return;
        }
        let Some(notifier) = &self.collaborators.notifier else {
            debug!("No notifier configured");
            return;
        };
        if self.config.recipients.is_empty() {
            info!(notifier = notifier.name(), "No recipients configured, not sending");
            return;
        }

        if let Err(e) = notifier.deliver(rendered, &self.config.recipients).await {
            run.record(StageError::new(
                Stage::Notifying,
                FaultKind::NotifyFault,
                Some(notifier.name().to_string()),
                e,
            ));
            return;
        }
        run.email_sent = true;

        match self.collaborators.store.mark_sent(newsletter_id, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => run.record(StageError::new(
                Stage::Notifying,
                FaultKind::NotifyFault,
                Some(newsletter_id.to_string()),
                "Sent newsletter is missing from the store",
            )),
            Err(e) => run.record(StageError::new(
                Stage::Notifying,
                FaultKind::NotifyFault,
                Some(newsletter_id.to_string()),
                e,
            )),
        }
    }

    fn title(&self, at: DateTime<Utc>, empty: bool) -> String {
        let title = format!("{} - {}", self.config.name, at.format("%B %d, %Y"));
        if empty {
            format!("{} (Empty)", title)
        } else {
            title
        }
    }
}

/// Keep the `max_stories` highest-impact stories, then order them by
/// category priority and impact, highest first.
pub fn select_and_order(
    mut stories: Vec<EnrichedStory>,
    selection: &RunSelection,
    max_stories: usize,
) -> Vec<EnrichedStory> {
    stories.sort_by_key(|s| Reverse(s.impact_score()));
    stories.truncate(max_stories);
    stories.sort_by_key(|s| (selection.category_rank(s.category()), Reverse(s.impact_score())));
    stories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(title: &str, category: &str, impact: u8) -> EnrichedStory {
        let story = ConsolidatedStory {
            canonical_title: title.to_string(),
            canonical_body: String::new(),
            canonical_url: format!("https://example.com/{}", title),
            canonical_source: "Example".to_string(),
            published_at: Utc::now(),
            category_hint: None,
            all_source_urls: vec![],
            source_names: Default::default(),
            is_consolidated: false,
            consolidation_reason: String::new(),
            original_article_count: 1,
        };
        EnrichedStory {
            story,
            enrichment: Enrichment::Enriched(Summary {
                summary_text: String::new(),
                key_points: vec![],
                impact_score: impact,
                category_label: category.to_string(),
            }),
        }
    }

    fn titles(stories: &[EnrichedStory]) -> Vec<&str> {
        stories.iter().map(|s| s.story.canonical_title.as_str()).collect()
    }

    #[test]
    fn test_order_by_category_then_impact() {
        let selection = resolve_selection(&NewsletterConfig::default());
        let stories = vec![
            story("other-high", "Other", 10),
            story("robotics-low", "Robotics", 3),
            story("policy-mid", "AI Policy", 6),
            story("robotics-high", "Robotics", 9),
            story("policy-high", "AI Policy", 8),
        ];
        let ordered = select_and_order(stories, &selection, 12);
        assert_eq!(
            titles(&ordered),
            vec!["policy-high", "policy-mid", "robotics-high", "robotics-low", "other-high"]
        );
    }

    #[test]
    fn test_top_n_by_impact_before_ordering() {
        let selection = resolve_selection(&NewsletterConfig::default());
        let stories = vec![
            story("policy-low", "AI Policy", 2),
            story("other-high", "Other", 9),
            story("robotics-mid", "Robotics", 5),
        ];
        let ordered = select_and_order(stories, &selection, 2);
        assert_eq!(titles(&ordered), vec!["robotics-mid", "other-high"]);
    }

    #[test]
    fn test_enrichment_stats() {
        let mut stories = vec![story("a", "Other", 8), story("b", "Other", 4)];
        stories.push(EnrichedStory {
            enrichment: Enrichment::Fallback(Summary::fallback_for(&stories[0].story)),
            ..stories[0].clone()
        });
        let stats = EnrichmentStats::from_stories(&stories);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.enriched, 2);
        assert_eq!(stats.fallback, 1);
        assert_eq!(stats.high_impact, 1);
        assert!((stats.average_impact - 17.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stage_error_display() {
        let fault = StageError::new(
            Stage::Scraping,
            FaultKind::SourceUnavailable,
            Some("Wired".to_string()),
            "timeout",
        );
        assert_eq!(fault.to_string(), "SCRAPING source unavailable: timeout");
        assert!(!fault.kind.is_fatal());
        assert!(FaultKind::PersistFault.is_fatal());
    }
}
