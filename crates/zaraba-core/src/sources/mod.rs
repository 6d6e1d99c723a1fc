mod fetch;
mod ir;
mod market;
mod wire;

use async_trait::async_trait;

use crate::ingest::{RawCandidate, SourceTag};
use crate::Result;

pub use fetch::PageFetcher;
pub use ir::IrNewsSource;
pub use market::MarketNewsSource;
pub use wire::WireSource;

/// One external listing. A poll returns a finite sequence of raw candidate
/// records in source-listing order; validation and dedup happen downstream.
#[async_trait]
pub trait Source: Send + Sync {
    fn tag(&self) -> SourceTag;

    async fn poll(&self) -> Result<Vec<RawCandidate>>;
}

/// Append an optional query filter to a listing URL
pub(crate) fn listing_url(base: &str, path: &str, filter: &Option<String>) -> String {
    let mut url = format!("{}{}", base.trim_end_matches('/'), path);
    if let Some(filter) = filter {
        if !filter.is_empty() {
            url.push('?');
            url.push_str(filter);
        }
    }
    url
}

/// Resolve a listing href against its page base
pub(crate) fn resolve_href(base: &str, href: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_url_with_and_without_filter() {
        assert_eq!(
            listing_url("https://kabutan.jp", "/news/marketnews/", &None),
            "https://kabutan.jp/news/marketnews/"
        );
        assert_eq!(
            listing_url(
                "https://kabutan.jp/",
                "/news/marketnews/",
                &Some("category=3".to_string())
            ),
            "https://kabutan.jp/news/marketnews/?category=3"
        );
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(
            resolve_href("https://kabutan.jp/news/marketnews/", "?b=n202504290001").as_deref(),
            Some("https://kabutan.jp/news/marketnews/?b=n202504290001")
        );
        assert_eq!(
            resolve_href("https://www.traders.co.jp/news/list/ALL/1", "/news/article/1234").as_deref(),
            Some("https://www.traders.co.jp/news/article/1234")
        );
        assert!(resolve_href("not a base", "/x").is_none());
    }
}
