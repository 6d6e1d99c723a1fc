use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zaraba_core::{
    ai::SummaryClient,
    notify::Notifier,
    refresh,
    scheduler::{jobs, JobContext, JobRunner},
    sources::PageFetcher,
    storage::{Database, DedupGate},
    AppConfig,
};

const HEARTBEAT_SECS: u64 = 300;

#[derive(Parser)]
#[command(name = "zaraba")]
#[command(author, version, about = "Market-news scraping and alerting daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (default)
    Run,
    /// Poll every listing once and exit
    Poll,
    /// Send the current digest page and exit
    Digest,
    /// Run one refresh pass over stale articles and exit
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so its log level can seed the filter
    let config = Arc::new(AppConfig::load()?);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    config.validate()?;

    let cli = Cli::parse();

    // Startup failures here are fatal by design: without the archive or
    // the notification session the daemon has nothing to do.
    let db = Arc::new(Database::new(&config).await?);
    let notifier = Arc::new(Notifier::connect(&config.notify).await?);

    let summarizer = if config.ai.enabled {
        Some(Arc::new(SummaryClient::new(&config.ai)?))
    } else {
        info!("AI summarization disabled");
        None
    };

    let ctx = Arc::new(JobContext {
        db,
        config: config.clone(),
        gate: Arc::new(DedupGate::new()),
        notifier,
        summarizer,
    });

    match cli.command {
        Some(Commands::Run) | None => run_daemon(ctx, config).await,
        Some(Commands::Poll) => {
            jobs::poll_market_news(ctx.clone()).await?;
            jobs::poll_ir_news(ctx.clone()).await?;
            jobs::poll_wire_news(ctx).await?;
            Ok(())
        }
        Some(Commands::Digest) => {
            jobs::send_digest(ctx).await?;
            Ok(())
        }
        Some(Commands::Refresh) => {
            let fetcher = PageFetcher::new(&ctx.config)?;
            let outcome =
                refresh::refresh_stale_articles(&ctx.db, &fetcher, &ctx.config.refresh).await?;
            println!(
                "Refreshed {}, unchanged {}, failed {}",
                outcome.refreshed, outcome.unchanged, outcome.failed
            );
            Ok(())
        }
    }
}

/// Register the job table, start the scheduler and block on the heartbeat
/// until a shutdown signal arrives. In-flight jobs are not drained; the
/// process simply stops dispatching and exits.
async fn run_daemon(ctx: Arc<JobContext>, config: Arc<AppConfig>) -> Result<()> {
    let mut runner = JobRunner::new(ctx);
    jobs::register_default_jobs(&mut runner, &config)?;

    let mut scheduler = runner.start().await?;

    info!("Daemon started (pid {})", std::process::id());

    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_SECS));
    heartbeat.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                info!("Daemon alive");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    scheduler
        .shutdown()
        .await
        .map_err(|e| anyhow::anyhow!("scheduler shutdown failed: {}", e))?;

    info!("Daemon stopped");
    Ok(())
}
