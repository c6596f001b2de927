use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use seo_agent::agent::{AgentDeps, Dispatcher, DispatcherSettings};
use seo_agent::channels::{Channel, CliChannel, OutgoingResponse};
use seo_agent::config::AppConfig;
use seo_agent::content::{ArticleProducer, ContentEngine};
use seo_agent::images::FallbackImageProvider;
use seo_agent::knowledge::KnowledgeCollector;
use seo_agent::llm::provider_from_settings;
use seo_agent::publish::{PublishTrigger, WebhookPublisher};
use seo_agent::scheduler::{self, CampaignScheduler};
use seo_agent::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config);

    eprintln!("🤖 SEO Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   LLM: {} ({})",
        config.llm.backend.name(),
        if config.llm.api_key.is_some() {
            config.llm.model.as_str()
        } else {
            "not configured"
        }
    );

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );
    db.init_schema().await.context("running migrations")?;
    eprintln!("   Database: {}", config.db_path.display());

    // ── Collaborators ────────────────────────────────────────────────────
    let llm = provider_from_settings(&config.llm)?;
    let generator = Arc::new(ContentEngine::new(llm));
    let images = Arc::new(FallbackImageProvider::from_config(&config.images));
    let image_sources = images.provider_names();
    eprintln!(
        "   Images: {}",
        if image_sources.is_empty() {
            "not configured".to_string()
        } else {
            image_sources.join(" → ")
        }
    );

    let publisher: Arc<dyn PublishTrigger> =
        Arc::new(WebhookPublisher::new(config.publish.clone()));
    eprintln!(
        "   Publish webhook: {}",
        if publisher.is_configured() {
            "configured"
        } else {
            "not configured"
        }
    );

    let producer = Arc::new(ArticleProducer::new(
        Arc::clone(&db),
        generator.clone(),
        images,
    ));
    let collector = Arc::new(KnowledgeCollector::new(Arc::clone(&db), generator));

    // ── Scheduler ────────────────────────────────────────────────────────
    let (notify_tx, mut notify_rx) = tokio::sync::mpsc::channel::<OutgoingResponse>(64);
    let campaign_scheduler = Arc::new(CampaignScheduler::new(
        config.scheduler.clone(),
        Arc::clone(&db),
        Arc::clone(&producer),
        Arc::clone(&publisher),
        notify_tx,
        config.review_url.clone(),
    ));
    let scheduler_handle = if config.scheduler.enabled {
        eprintln!(
            "   Scheduler: every {}s",
            config.scheduler.poll_interval.as_secs()
        );
        Some(scheduler::spawn_scheduler(
            Arc::clone(&campaign_scheduler),
            config.scheduler.poll_interval,
        ))
    } else {
        eprintln!("   Scheduler: disabled");
        None
    };

    // ── Dispatcher ───────────────────────────────────────────────────────
    let dispatcher = Dispatcher::new(
        AgentDeps {
            store: Arc::clone(&db),
            producer,
            collector,
            scheduler: Arc::clone(&campaign_scheduler),
            publisher,
        },
        DispatcherSettings {
            campaign_defaults: config.campaign.clone(),
            review_url: config.review_url.clone(),
            llm_model: config.llm.api_key.as_ref().map(|_| config.llm.model.clone()),
            image_sources,
        },
    );

    eprintln!("   Type a message and press Enter. /quit to exit.\n");

    let cli = Arc::new(CliChannel::new());
    let notifier = Arc::clone(&cli);
    tokio::spawn(async move {
        while let Some(note) = notify_rx.recv().await {
            if let Err(e) = notifier.broadcast(note).await {
                tracing::warn!("Failed to deliver notification: {e}");
            }
        }
    });

    let mut messages = cli.start().await?;
    while let Some(message) = messages.next().await {
        let reply = dispatcher
            .handle_in_session(message.session_id(), &message.content)
            .await;
        if let Err(e) = cli.respond(&message, OutgoingResponse::text(reply)).await {
            tracing::error!("Failed to send reply: {e}");
        }
    }

    campaign_scheduler.stop();
    if let Some(handle) = scheduler_handle {
        handle.abort();
    }
    cli.shutdown().await?;
    eprintln!("👋 Bye");
    Ok(())
}

/// Stderr logging filtered by `RUST_LOG`, plus a daily log file when a log
/// directory is configured.
fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "seo-agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .init();
            None
        }
    }
}
