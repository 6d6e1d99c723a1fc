use std::sync::Arc;

use super::service::{JobContext, JobRunner};
use crate::ingest::{normalize_candidate, Candidate};
use crate::notify::{digest, render};
use crate::refresh;
use crate::sources::{IrNewsSource, MarketNewsSource, PageFetcher, Source, WireSource};
use crate::storage::{
    Article, ArticleRepository, Database, DedupGate, GateOutcome, WireArticle, WireGateOutcome,
    WireRepository,
};
use crate::Result;

/// A candidate that made it through the gate, with its stored row
pub struct Ingested {
    pub article: Article,
    pub candidate: Candidate,
}

/// Run one source through validate → normalize → dedup gate.
///
/// Candidates are processed in source-listing order. Invalid records and
/// duplicates are dropped quietly; a failed insert is logged and dropped
/// from the batch without aborting the rest. Only newly stored items are
/// returned — they are the only ones the notifier may see.
pub async fn ingest_source(
    db: &Database,
    gate: &DedupGate,
    source: &dyn Source,
) -> Result<Vec<Ingested>> {
    let raw_candidates = source.poll().await?;
    let repo = ArticleRepository::new(db);
    let mut inserted = Vec::new();

    for raw in raw_candidates {
        let candidate = match raw.validate() {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::debug!("Dropping candidate from {}: {}", source.tag().as_str(), e);
                continue;
            }
        };

        let normalized = match normalize_candidate(candidate) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::warn!("Dropping unnormalizable candidate: {}", e);
                continue;
            }
        };

        match gate.admit(&repo, &normalized).await {
            Ok(GateOutcome::Inserted(article)) => {
                tracing::debug!("Stored article '{}'", article.title);
                inserted.push(Ingested {
                    article,
                    candidate: normalized.candidate,
                });
            }
            Ok(GateOutcome::Duplicate) => {
                tracing::debug!("Skipping duplicate '{}'", normalized.candidate.title);
            }
            Err(e) => {
                tracing::error!("Failed to persist '{}': {}", normalized.candidate.title, e);
            }
        }
    }

    Ok(inserted)
}

/// Same pipeline for the wire listing, against its own table
pub async fn ingest_wire(
    db: &Database,
    gate: &DedupGate,
    source: &WireSource,
) -> Result<Vec<WireArticle>> {
    let raw_candidates = source.poll().await?;
    let repo = WireRepository::new(db);
    let mut inserted = Vec::new();

    for raw in raw_candidates {
        let candidate = match raw.validate() {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::debug!("Dropping wire candidate: {}", e);
                continue;
            }
        };

        let normalized = match normalize_candidate(candidate) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::warn!("Dropping unnormalizable wire candidate: {}", e);
                continue;
            }
        };

        match gate.admit_wire(&repo, &normalized).await {
            Ok(WireGateOutcome::Inserted(article)) => inserted.push(article),
            Ok(WireGateOutcome::Duplicate) => {
                tracing::debug!("Skipping duplicate wire item '{}'", normalized.candidate.title);
            }
            Err(e) => {
                tracing::error!(
                    "Failed to persist wire item '{}': {}",
                    normalized.candidate.title,
                    e
                );
            }
        }
    }

    Ok(inserted)
}

/// Poll the market-news listing and notify for everything newly stored
pub async fn poll_market_news(ctx: Arc<JobContext>) -> Result<()> {
    let fetcher = PageFetcher::new(&ctx.config)?;
    let source = MarketNewsSource::new(fetcher, &ctx.config.scraping);

    let new_items = ingest_source(&ctx.db, &ctx.gate, &source).await?;
    if new_items.is_empty() {
        return Ok(());
    }

    tracing::info!("Market poll: {} new articles", new_items.len());

    let articles: Vec<Article> = new_items.into_iter().map(|item| item.article).collect();
    render::notify_new(&ctx.notifier, &ctx.config.notify, &articles).await;

    Ok(())
}

/// Poll the realtime IR listing; only urgent-flagged disclosures are
/// routed onward, the rest are archived silently
pub async fn poll_ir_news(ctx: Arc<JobContext>) -> Result<()> {
    let fetcher = PageFetcher::new(&ctx.config)?;
    let source = IrNewsSource::new(fetcher, &ctx.config.scraping);

    let new_items = ingest_source(&ctx.db, &ctx.gate, &source).await?;
    if new_items.is_empty() {
        return Ok(());
    }

    tracing::info!("IR poll: {} new disclosures", new_items.len());

    let items: Vec<_> = new_items
        .into_iter()
        .map(|item| (item.article, item.candidate))
        .collect();
    render::notify_urgent(&ctx.notifier, &ctx.config.notify, &items).await;

    Ok(())
}

/// Poll the wire listing and notify for everything newly stored
pub async fn poll_wire_news(ctx: Arc<JobContext>) -> Result<()> {
    let fetcher = PageFetcher::new(&ctx.config)?;
    let source = WireSource::new(fetcher, &ctx.config.scraping);

    let new_items = ingest_wire(&ctx.db, &ctx.gate, &source).await?;
    if new_items.is_empty() {
        return Ok(());
    }

    tracing::info!("Wire poll: {} new items", new_items.len());
    render::notify_wire(&ctx.notifier, &ctx.config.notify, &new_items).await;

    Ok(())
}

/// Send the first page of the trailing-window digest
pub async fn send_digest(ctx: Arc<JobContext>) -> Result<()> {
    match digest::render_current(&ctx.db, &ctx.config.digest, 1).await? {
        Some(message) => {
            ctx.notifier
                .send(&ctx.config.notify.alert_channel, &message)
                .await?;
            Ok(())
        }
        None => {
            tracing::debug!("Digest window is empty, nothing to send");
            Ok(())
        }
    }
}

/// Re-fetch bodies for stale articles
pub async fn refresh_stale(ctx: Arc<JobContext>) -> Result<()> {
    let fetcher = PageFetcher::new(&ctx.config)?;
    refresh::refresh_stale_articles(&ctx.db, &fetcher, &ctx.config.refresh).await?;
    Ok(())
}

/// Summarize articles that have a body but no summary yet
pub async fn summarize_pending(ctx: Arc<JobContext>) -> Result<()> {
    let Some(summarizer) = ctx.summarizer.clone() else {
        return Ok(());
    };

    let repo = ArticleRepository::new(&ctx.db);
    let pending = repo.list_unsummarized(ctx.config.ai.batch_limit).await?;

    let mut summarized = 0;
    for article in pending {
        let Some(body) = article.body.as_deref() else {
            continue;
        };
        match summarizer.generate_and_store(&ctx.db, article.id, body).await {
            Ok(()) => summarized += 1,
            Err(e) => tracing::warn!("Failed to summarize '{}': {}", article.title, e),
        }
    }

    if summarized > 0 {
        tracing::info!("Summarized {} articles", summarized);
    }

    Ok(())
}

/// Register the standard job table against the configured schedules
pub fn register_default_jobs(runner: &mut JobRunner, config: &crate::AppConfig) -> Result<()> {
    runner.register(
        "market-news",
        &config.scraping.market_schedule,
        Arc::new(|ctx| Box::pin(poll_market_news(ctx))),
    )?;
    runner.register(
        "ir-news",
        &config.scraping.ir_schedule,
        Arc::new(|ctx| Box::pin(poll_ir_news(ctx))),
    )?;
    runner.register(
        "wire-news",
        &config.scraping.wire_schedule,
        Arc::new(|ctx| Box::pin(poll_wire_news(ctx))),
    )?;
    runner.register(
        "hourly-digest",
        &config.digest.schedule,
        Arc::new(|ctx| Box::pin(send_digest(ctx))),
    )?;
    runner.register(
        "body-refresh",
        &config.refresh.schedule,
        Arc::new(|ctx| Box::pin(refresh_stale(ctx))),
    )?;
    if config.ai.enabled {
        runner.register(
            "summarize",
            &config.ai.schedule,
            Arc::new(|ctx| Box::pin(summarize_pending(ctx))),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{RawCandidate, SourceTag};
    use async_trait::async_trait;

    /// Replays a fixed candidate list, like one listing page
    struct StubSource {
        candidates: Vec<RawCandidate>,
    }

    #[async_trait]
    impl Source for StubSource {
        fn tag(&self) -> SourceTag {
            SourceTag::Market
        }

        async fn poll(&self) -> Result<Vec<RawCandidate>> {
            Ok(self.candidates.clone())
        }
    }

    fn raw(title: &str, url: &str) -> RawCandidate {
        let mut raw = RawCandidate::new(SourceTag::Market);
        raw.date = Some("2025-04-29T18:13:00+09:00".to_string());
        raw.category = Some("市場速報".to_string());
        raw.title = Some(title.to_string());
        raw.url = Some(url.to_string());
        raw
    }

    #[tokio::test]
    async fn test_second_pass_stores_and_notifies_nothing() {
        let db = Database::new_in_memory().await.unwrap();
        let gate = DedupGate::new();

        // Same article listed twice: identical title and canonical URL,
        // raw query encoding differs between the listings
        let first_pass = StubSource {
            candidates: vec![raw("日経平均が続伸", "https://kabutan.jp/news/a")],
        };
        let second_pass = StubSource {
            candidates: vec![
                raw("日経平均が続伸", "https://kabutan.jp/news/a"),
                raw("日経平均が続伸", "https://kabutan.jp/news/%61"),
            ],
        };

        let inserted = ingest_source(&db, &gate, &first_pass).await.unwrap();
        assert_eq!(inserted.len(), 1);

        // The returned list is exactly what the notifier would deliver:
        // nothing new on the second pass means zero notifications
        let inserted = ingest_source(&db, &gate, &second_pass).await.unwrap();
        assert!(inserted.is_empty());

        let repo = ArticleRepository::new(&db);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_candidates_are_dropped_not_fatal() {
        let db = Database::new_in_memory().await.unwrap();
        let gate = DedupGate::new();

        let mut missing_date = raw("日時なし", "https://kabutan.jp/news/b");
        missing_date.date = None;
        let mut bad_url = raw("URLが壊れている", "https://kabutan.jp/news/c");
        bad_url.url = Some("not a url".to_string());

        let source = StubSource {
            candidates: vec![
                missing_date,
                bad_url,
                raw("有効な記事", "https://kabutan.jp/news/d"),
            ],
        };

        let inserted = ingest_source(&db, &gate, &source).await.unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].article.title, "有効な記事");
    }
}
