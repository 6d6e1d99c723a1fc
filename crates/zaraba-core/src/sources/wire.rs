use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDateTime};
use regex::Regex;
use scraper::{Html, Selector};

use super::{listing_url, resolve_href, PageFetcher, Source};
use crate::config::ScrapingConfig;
use crate::ingest::{RawCandidate, SourceTag};
use crate::Result;

const WIRE_CATEGORY: &str = "トレーダーズ";

/// Wire listing on traders.co.jp. Timestamps come as
/// `2025/04/29(火) 18:13` in JST; the weekday parenthetical is folded out
/// before parsing and the result is carried as RFC 3339.
pub struct WireSource {
    fetcher: PageFetcher,
    base_url: String,
    max_articles: usize,
}

impl WireSource {
    pub fn new(fetcher: PageFetcher, config: &ScrapingConfig) -> Self {
        Self {
            fetcher,
            base_url: config.traders_base_url.clone(),
            max_articles: config.max_wire_articles,
        }
    }
}

#[async_trait]
impl Source for WireSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Wire
    }

    async fn poll(&self) -> Result<Vec<RawCandidate>> {
        let url = listing_url(&self.base_url, "/news/list/ALL/1", &None);
        let html = self.fetcher.fetch_text(&url).await?;
        Ok(parse_listing(&html, &self.base_url, self.max_articles))
    }
}

fn parse_listing(html: &str, base_url: &str, max_articles: usize) -> Vec<RawCandidate> {
    let document = Html::parse_document(html);
    let container_selector = Selector::parse(".news_container").unwrap();
    let timestamp_selector = Selector::parse(".timestamp").unwrap();
    let link_selector = Selector::parse(".news_headline a.news_link").unwrap();
    let weekday = Regex::new(r"\(.+?\)").unwrap();

    let mut candidates = Vec::new();

    for container in document.select(&container_selector) {
        if candidates.len() >= max_articles {
            break;
        }

        let mut candidate = RawCandidate::new(SourceTag::Wire);
        candidate.category = Some(WIRE_CATEGORY.to_string());

        candidate.date = container
            .select(&timestamp_selector)
            .next()
            .map(|e| e.text().collect::<String>())
            .and_then(|raw| parse_jst_timestamp(&weekday, &raw));

        if let Some(link) = container.select(&link_selector).next() {
            let title = link.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                candidate.title = Some(title);
            }
            candidate.url = link
                .value()
                .attr("href")
                .and_then(|href| resolve_href(base_url, href));
        }

        candidates.push(candidate);
    }

    candidates
}

/// `2025/04/29(火) 18:13` → `2025-04-29T18:13:00+09:00`
fn parse_jst_timestamp(weekday: &Regex, raw: &str) -> Option<String> {
    let cleaned = weekday.replace_all(raw, "");
    let cleaned = cleaned.trim();

    let naive = NaiveDateTime::parse_from_str(cleaned, "%Y/%m/%d %H:%M").ok()?;
    let jst = FixedOffset::east_opt(9 * 3600)?;
    let local = naive.and_local_timezone(jst).single()?;

    Some(local.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <div class="news_container">
            <span class="timestamp">2025/04/29(火) 18:13</span>
            <div class="news_headline">
                <a class="news_link" href="/news/article/20250429-01">＜本日の注目銘柄＞</a>
            </div>
        </div>
        <div class="news_container">
            <span class="timestamp">壊れた日時</span>
            <div class="news_headline">
                <a class="news_link" href="/news/article/20250429-02">日時が読めない行</a>
            </div>
        </div>
    "#;

    #[test]
    fn test_jst_timestamp_is_folded_and_converted() {
        let weekday = Regex::new(r"\(.+?\)").unwrap();
        assert_eq!(
            parse_jst_timestamp(&weekday, " 2025/04/29(火) 18:13 ").as_deref(),
            Some("2025-04-29T18:13:00+09:00")
        );
        assert!(parse_jst_timestamp(&weekday, "tomorrow").is_none());
    }

    #[test]
    fn test_parse_listing() {
        let candidates = parse_listing(LISTING, "https://www.traders.co.jp", 10);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].category.as_deref(), Some(WIRE_CATEGORY));
        assert_eq!(
            candidates[0].date.as_deref(),
            Some("2025-04-29T18:13:00+09:00")
        );
        assert_eq!(
            candidates[0].url.as_deref(),
            Some("https://www.traders.co.jp/news/article/20250429-01")
        );

        // Unreadable timestamp leaves the date empty; validation drops it
        assert!(candidates[1].date.is_none());
    }
}
