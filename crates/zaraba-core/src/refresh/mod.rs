use chrono::{Duration, Utc};

use crate::config::RefreshConfig;
use crate::sources::PageFetcher;
use crate::storage::{ArticleRepository, Database};
use crate::Result;

/// Tally of one refresh pass
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    pub refreshed: u32,
    pub unchanged: u32,
    pub failed: u32,
}

/// Re-fetch bodies for stale articles.
///
/// Selection: not scraped within the staleness window and retry budget
/// remaining. A changed body is stored and spends one retry; an unchanged
/// fetch only bumps last_scraped_at so the article leaves the window; a
/// fetch failure spends one retry. Once retry_count reaches the bound the
/// article is never selected again.
pub async fn refresh_stale_articles(
    db: &Database,
    fetcher: &PageFetcher,
    config: &RefreshConfig,
) -> Result<RefreshOutcome> {
    let repo = ArticleRepository::new(db);
    let cutoff = Utc::now() - Duration::hours(config.staleness_hours as i64);

    let candidates = repo
        .list_refresh_candidates(cutoff, config.max_retries, config.batch_limit)
        .await?;

    if candidates.is_empty() {
        return Ok(RefreshOutcome::default());
    }

    tracing::info!("Refreshing {} stale articles", candidates.len());

    let mut outcome = RefreshOutcome::default();

    for article in candidates {
        match fetcher.fetch_text(&article.url).await {
            Ok(html) => {
                let body = extract_body(&html);
                if article.body.as_deref() != Some(body.as_str()) {
                    repo.mark_refreshed(article.id, &body).await?;
                    outcome.refreshed += 1;
                    tracing::debug!("Refreshed body for '{}'", article.title);
                } else {
                    repo.touch_scraped(article.id).await?;
                    outcome.unchanged += 1;
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Refresh fetch failed for '{}' (retry {}/{}): {}",
                    article.title,
                    article.retry_count + 1,
                    config.max_retries,
                    e
                );
                repo.bump_retry(article.id).await?;
                outcome.failed += 1;
            }
        }
    }

    tracing::info!(
        "Refresh pass done: {} refreshed, {} unchanged, {} failed",
        outcome.refreshed,
        outcome.unchanged,
        outcome.failed
    );

    Ok(outcome)
}

/// Reduce an article page to plain text
fn extract_body(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_body_strips_markup() {
        let body = extract_body("<html><body><p>決算は<b>増益</b>でした。</p></body></html>");
        assert!(body.contains("決算は"));
        assert!(body.contains("増益"));
        assert!(!body.contains("<p>"));
    }
}
