use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{listing_url, resolve_href, PageFetcher, Source};
use crate::config::ScrapingConfig;
use crate::ingest::{RawCandidate, SourceTag};
use crate::Result;

/// Market-news listing on kabutan
pub struct MarketNewsSource {
    fetcher: PageFetcher,
    base_url: String,
    filter: Option<String>,
}

impl MarketNewsSource {
    pub fn new(fetcher: PageFetcher, config: &ScrapingConfig) -> Self {
        Self {
            fetcher,
            base_url: config.kabutan_base_url.clone(),
            filter: config.market_filter.clone(),
        }
    }
}

#[async_trait]
impl Source for MarketNewsSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Market
    }

    async fn poll(&self) -> Result<Vec<RawCandidate>> {
        let url = listing_url(&self.base_url, "/news/marketnews/", &self.filter);
        let html = self.fetcher.fetch_text(&url).await?;
        Ok(parse_listing(&html, &url))
    }
}

fn parse_listing(html: &str, page_url: &str) -> Vec<RawCandidate> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse(".s_news_list tr").unwrap();
    let time_selector = Selector::parse("td.news_time time").unwrap();
    let category_selector = Selector::parse("td:nth-child(2) div.newslist_ctg").unwrap();
    let link_selector = Selector::parse("td:nth-child(3) a").unwrap();

    let mut candidates = Vec::new();

    for row in document.select(&row_selector) {
        let mut candidate = RawCandidate::new(SourceTag::Market);

        candidate.date = row
            .select(&time_selector)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .map(str::to_string);

        candidate.category = row
            .select(&category_selector)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());

        if let Some(link) = row.select(&link_selector).next() {
            let title = link.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                candidate.title = Some(title);
            }
            candidate.url = link
                .value()
                .attr("href")
                .and_then(|href| resolve_href(page_url, href));
        }

        candidates.push(candidate);
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <table class="s_news_list mgbt0">
            <tr>
                <td class="news_time"><time datetime="2025-04-29T18:13:00+09:00">18:13</time></td>
                <td><div class="newslist_ctg">決算</div></td>
                <td><a href="?b=k202504290001">ABC社、最高益を更新</a></td>
            </tr>
            <tr>
                <td class="news_time"><time datetime="2025-04-29T18:10:00+09:00">18:10</time></td>
                <td><div class="newslist_ctg">市場速報</div></td>
                <td><a href="?b=k202504290002">日経平均が続伸</a></td>
            </tr>
            <tr>
                <td class="news_time"></td>
                <td><div class="newslist_ctg">決算</div></td>
                <td><a href="?b=k202504290003">日時のない行</a></td>
            </tr>
        </table>
    "#;

    #[test]
    fn test_parse_listing_in_page_order() {
        let candidates = parse_listing(LISTING, "https://kabutan.jp/news/marketnews/");

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].title.as_deref(), Some("ABC社、最高益を更新"));
        assert_eq!(candidates[0].category.as_deref(), Some("決算"));
        assert_eq!(
            candidates[0].date.as_deref(),
            Some("2025-04-29T18:13:00+09:00")
        );
        assert_eq!(
            candidates[0].url.as_deref(),
            Some("https://kabutan.jp/news/marketnews/?b=k202504290001")
        );
        assert_eq!(candidates[1].title.as_deref(), Some("日経平均が続伸"));
    }

    #[test]
    fn test_row_without_timestamp_stays_incomplete() {
        let candidates = parse_listing(LISTING, "https://kabutan.jp/news/marketnews/");

        // The malformed row is still produced; validation drops it later
        assert!(candidates[2].date.is_none());
        assert!(candidates[2].clone().validate().is_err());
    }
}
