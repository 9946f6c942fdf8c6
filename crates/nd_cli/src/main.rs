use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use nd_core::config::DEFAULT_CONFIG_FILE;
use nd_core::{NewsletterConfig, Notifier, TriggerKind};
use nd_inference::ModelKind;
use nd_pipeline::{
    resolve_selection, Collaborators, ConcurrencyGate, HumanDuration, PipelineOrchestrator, PipelineRun, ResendNotifier,
    RunStatus, ScheduleSpec, Scheduler, TemplateRenderer,
};
use nd_scrapers::HtmlSourceScraper;
use nd_storage::StoreKind;
use tracing::{info, warn};

mod logging;

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily AI news digest: scrape, deduplicate, summarize, publish", long_about = None)]
pub struct Cli {
    /// Newsletter configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long, value_enum, default_value_t = StoreKind::Json)]
    store: StoreKind,
    /// Path of the JSON newsletter store
    #[arg(long)]
    store_path: Option<PathBuf>,
    /// Override the dedup similarity threshold, in (0, 1]
    #[arg(long)]
    threshold: Option<f64>,
    /// Summarizer: openai or extractive. Defaults to openai when OPENAI_API_KEY is set.
    #[arg(long)]
    model: Option<ModelKind>,
    /// Run on a fixed interval instead of the configured daily time (e.g. 1h, 30m, 1h15m30s)
    #[arg(long)]
    interval: Option<HumanDuration>,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate one newsletter now
    Run {
        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the dashboard API, with the scheduler when enabled
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
    /// Run the scheduler until interrupted
    Schedule,
    /// List the feeds and categories a run would use
    Sources,
    /// Write the default configuration file
    Init {
        #[arg(long)]
        force: bool,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<NewsletterConfig> {
    let mut config = NewsletterConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(threshold) = cli.threshold {
        config.dedup.similarity_threshold = threshold;
    }
    Ok(config)
}

async fn build_orchestrator(cli: &Cli, config: NewsletterConfig) -> anyhow::Result<Arc<PipelineOrchestrator>> {
    let store = nd_storage::create_store(cli.store, cli.store_path.clone())
        .await
        .context("opening newsletter store")?;
    info!("💾 Newsletter store ready ({:?})", cli.store);

    let mut model_config = nd_inference::Config::default();
    model_config.model = cli.model.unwrap_or(if model_config.api_key.is_some() {
        ModelKind::OpenAi
    } else {
        ModelKind::Extractive
    });
    let summarizer = nd_inference::create_summarizer(&model_config).context("creating summarizer")?;
    info!("🧠 Summarizer initialized (using {})", summarizer.name());

    let notifier = ResendNotifier::from_env().map(|n| Arc::new(n) as Arc<dyn Notifier>);
    if notifier.is_none() {
        warn!("RESEND_API_KEY not set, newsletters will not be emailed");
    }

    let renderer = Arc::new(TemplateRenderer::new(config.categories.clone()));
    let collaborators = Collaborators {
        source: Arc::new(HtmlSourceScraper::new()?),
        summarizer,
        renderer,
        store,
        notifier,
    };
    let orchestrator = PipelineOrchestrator::new(config, Arc::new(ConcurrencyGate::new()), collaborators)
        .context("invalid pipeline configuration")?;
    Ok(Arc::new(orchestrator))
}

fn schedule_spec(cli: &Cli, config: &NewsletterConfig) -> anyhow::Result<Option<ScheduleSpec>> {
    if let Some(interval) = &cli.interval {
        return Ok(Some(ScheduleSpec::Every(interval.0)));
    }
    Ok(ScheduleSpec::from_config(config)?)
}

fn print_run(run: &PipelineRun) {
    println!(
        "Run {} ({}) finished: {:?}",
        run.id,
        run.trigger_kind,
        run.status().unwrap_or(RunStatus::Failed)
    );
    if let Some(stats) = &run.dedup_stats {
        println!(
            "  {} articles -> {} unique stories ({} consolidated)",
            stats.total_articles, stats.unique_stories, stats.consolidated_stories
        );
    }
    if let Some(id) = &run.newsletter_id {
        println!("  newsletter {} with {} stories, emailed: {}", id, run.story_count, run.email_sent);
    }
    for fault in &run.stage_errors {
        println!("  ⚠️ {}{}", fault, fault.subject.as_deref().map(|s| format!(" [{}]", s)).unwrap_or_default());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match &cli.command {
        Commands::Init { force } => {
            if cli.config.exists() && !force {
                bail!("{} already exists, use --force to overwrite", cli.config.display());
            }
            NewsletterConfig::default().save(&cli.config)?;
            println!("Wrote default configuration to {}", cli.config.display());
        }
        Commands::Sources => {
            let config = load_config(&cli)?;
            let selection = resolve_selection(&config);
            println!("Feeds ({}):", selection.feeds.len());
            for feed in &selection.feeds {
                println!("  {:<20} {:<24} {}", feed.id, feed.name, feed.url);
            }
            println!("Categories ({}):", selection.categories.len());
            for category in &selection.categories {
                println!("  {:>3} {} {}", category.priority, category.emoji, category.name);
            }
        }
        Commands::Run { json } => {
            let config = load_config(&cli)?;
            let orchestrator = build_orchestrator(&cli, config).await?;
            let run = orchestrator.run(TriggerKind::Manual).await;
            if *json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                print_run(&run);
            }
            if run.status() == Some(RunStatus::Failed) {
                bail!("newsletter run failed");
            }
        }
        Commands::Schedule => {
            let config = load_config(&cli)?;
            let Some(spec) = schedule_spec(&cli, &config)? else {
                bail!("scheduling is disabled in {}; pass --interval to run periodically", cli.config.display());
            };
            let orchestrator = build_orchestrator(&cli, config).await?;
            let (handle, stop) = Arc::new(Scheduler::new(orchestrator, spec)).spawn();
            tokio::signal::ctrl_c().await?;
            info!("Interrupted, stopping scheduler");
            let _ = stop.send(true);
            handle.await?;
        }
        Commands::Serve { addr } => {
            let config = load_config(&cli)?;
            let spec = schedule_spec(&cli, &config)?;
            let orchestrator = build_orchestrator(&cli, config).await?;

            let scheduler = spec.map(|spec| Arc::new(Scheduler::new(Arc::clone(&orchestrator), spec)));
            let stop = scheduler.as_ref().map(|s| Arc::clone(s).spawn().1);
            if stop.is_none() {
                info!("Scheduling disabled, only manual runs via POST /api/runs");
            }

            nd_web::serve(nd_web::AppState::new(orchestrator, scheduler), *addr).await?;
            drop(stop);
        }
    }

    Ok(())
}
