use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{listing_url, resolve_href, PageFetcher, Source};
use crate::config::ScrapingConfig;
use crate::ingest::{RawCandidate, SourceTag};
use crate::Result;

/// Realtime IR listing on kabutan. Rows whose category cell carries the
/// `kk_b` marker class are urgent disclosures and get routed separately.
pub struct IrNewsSource {
    fetcher: PageFetcher,
    base_url: String,
    filter: Option<String>,
    max_articles: usize,
}

impl IrNewsSource {
    pub fn new(fetcher: PageFetcher, config: &ScrapingConfig) -> Self {
        Self {
            fetcher,
            base_url: config.kabutan_base_url.clone(),
            filter: config.ir_filter.clone(),
            max_articles: config.max_ir_articles,
        }
    }
}

#[async_trait]
impl Source for IrNewsSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Ir
    }

    async fn poll(&self) -> Result<Vec<RawCandidate>> {
        let url = listing_url(&self.base_url, "/news/", &self.filter);
        let html = self.fetcher.fetch_text(&url).await?;
        Ok(parse_listing(&html, &url, self.max_articles))
    }
}

fn parse_listing(html: &str, page_url: &str, max_articles: usize) -> Vec<RawCandidate> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("#news_contents .s_news_list tr").unwrap();
    let time_selector = Selector::parse("td.news_time time").unwrap();
    let category_selector = Selector::parse("td:nth-child(2) div.newslist_ctg").unwrap();
    let code_selector = Selector::parse("td:nth-child(3)").unwrap();
    let link_selector = Selector::parse("td:nth-child(4) a").unwrap();

    let mut candidates = Vec::new();

    for row in document.select(&row_selector) {
        if candidates.len() >= max_articles {
            break;
        }

        let mut candidate = RawCandidate::new(SourceTag::Ir);

        candidate.date = row
            .select(&time_selector)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .map(str::to_string);

        if let Some(category_cell) = row.select(&category_selector).next() {
            let text = category_cell.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                candidate.category = Some(text);
            }
            candidate.urgent = category_cell
                .value()
                .attr("class")
                .map(|class| class.contains("kk_b"))
                .unwrap_or(false);
        }

        candidate.stock_code = row
            .select(&code_selector)
            .next()
            .and_then(|cell| cell.value().attr("data-code"))
            .map(str::to_string);

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
        <div id="news_contents">
            <table class="s_news_list">
                <tr>
                    <td class="news_time"><time datetime="2025-04-29T14:00:00+09:00">14:00</time></td>
                    <td><div class="newslist_ctg kk_b">決算</div></td>
                    <td data-code="7203"></td>
                    <td><a href="/news/?b=ir001">トヨタ、通期予想を上方修正</a></td>
                </tr>
                <tr>
                    <td class="news_time"><time datetime="2025-04-29T14:01:00+09:00">14:01</time></td>
                    <td><div class="newslist_ctg">開示</div></td>
                    <td data-code="6758"></td>
                    <td><a href="/news/?b=ir002">ソニー、自社株買いを発表</a></td>
                </tr>
            </table>
        </div>
    "#;

    #[test]
    fn test_urgent_flag_comes_from_marker_class() {
        let candidates = parse_listing(LISTING, "https://kabutan.jp/news/", 10);

        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].urgent);
        assert_eq!(candidates[0].stock_code.as_deref(), Some("7203"));
        assert_eq!(
            candidates[0].url.as_deref(),
            Some("https://kabutan.jp/news/?b=ir001")
        );
        assert!(!candidates[1].urgent);
    }

    #[test]
    fn test_listing_cap_is_applied() {
        let candidates = parse_listing(LISTING, "https://kabutan.jp/news/", 1);
        assert_eq!(candidates.len(), 1);
    }
}
