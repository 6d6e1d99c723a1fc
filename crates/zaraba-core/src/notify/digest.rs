use chrono::{DateTime, Duration, FixedOffset, Utc};

use super::message::{
    ActionRow, Button, Embed, EmbedAuthor, EmbedField, EmbedFooter, OutboundMessage,
};
use super::render::truncate;
use crate::config::DigestConfig;
use crate::storage::{Article, ArticleRepository, Database};
use crate::Result;

const TITLE_BUDGET: usize = 50;
const DIGEST_COLOR: u32 = 0x00BFFF;

const PREV_TOKEN_PREFIX: &str = "digest_prev:";
const NEXT_TOKEN_PREFIX: &str = "digest_next:";

/// Pages needed for `count` items at `per_page` items each
pub fn total_pages(count: usize, per_page: usize) -> usize {
    count.div_ceil(per_page)
}

/// Clamp a requested page into `[1, total]`
pub fn clamp_page(requested: i64, total: usize) -> usize {
    if requested < 1 {
        1
    } else if requested as usize > total {
        total
    } else {
        requested as usize
    }
}

/// Parse a navigation token back into its target page
pub fn parse_nav_token(custom_id: &str) -> Option<i64> {
    let page = custom_id
        .strip_prefix(PREV_TOKEN_PREFIX)
        .or_else(|| custom_id.strip_prefix(NEXT_TOKEN_PREFIX))?;
    page.parse().ok()
}

/// Render one digest page from a window snapshot.
///
/// Pure in (snapshot, page): navigation re-invokes this against whatever
/// the window contains *now*, so two renders of the same page number at
/// different times may legitimately differ. Returns `None` for an empty
/// window — no digest is sent then.
pub fn render_page(
    articles: &[Article],
    requested_page: i64,
    per_page: usize,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Option<OutboundMessage> {
    if articles.is_empty() {
        return None;
    }

    let total = total_pages(articles.len(), per_page);
    let page = clamp_page(requested_page, total);

    let start = (page - 1) * per_page;
    let end = (start + per_page).min(articles.len());

    let jst = FixedOffset::east_opt(9 * 3600).expect("fixed JST offset");
    let fields = articles[start..end]
        .iter()
        .map(|article| EmbedField {
            name: article
                .published_at
                .with_timezone(&jst)
                .format("%H:%M")
                .to_string(),
            value: format!("[{}]({})", truncate(&article.title, TITLE_BUDGET), article.url),
            inline: false,
        })
        .collect();

    let embed = Embed {
        author: Some(EmbedAuthor {
            name: "🕒 直近1時間のニュース".to_string(),
            icon_url: Some("https://kabutan.jp/favicon.ico".to_string()),
        }),
        description: Some(format!(
            "※ {} ～ {} の記事を表示 (Page {}/{})",
            window_start.with_timezone(&jst).format("%H:%M"),
            window_end.with_timezone(&jst).format("%H:%M"),
            page,
            total
        )),
        fields,
        color: Some(DIGEST_COLOR),
        timestamp: Some(window_end.to_rfc3339()),
        footer: Some(EmbedFooter {
            text: format!("Powered by zaraba {}", env!("CARGO_PKG_VERSION")),
            icon_url: None,
        }),
        ..Default::default()
    };

    let mut buttons = Vec::new();
    if page > 1 {
        buttons.push(Button::page(
            "◀️ Prev",
            format!("{}{}", PREV_TOKEN_PREFIX, page - 1),
        ));
    }
    if page < total {
        buttons.push(Button::page(
            "Next ▶️",
            format!("{}{}", NEXT_TOKEN_PREFIX, page + 1),
        ));
    }

    let components = if buttons.is_empty() {
        Vec::new()
    } else {
        vec![ActionRow::new(buttons)]
    };

    Some(OutboundMessage {
        embeds: vec![embed],
        components,
        ..Default::default()
    })
}

/// Render the requested digest page against the current archive contents
pub async fn render_current(
    db: &Database,
    config: &DigestConfig,
    page: i64,
) -> Result<Option<OutboundMessage>> {
    let now = Utc::now();
    let cutoff = now - Duration::seconds(config.window_secs as i64);

    let repo = ArticleRepository::new(db);
    let recent = repo.list_published_since(cutoff).await?;

    Ok(render_page(&recent, page, config.page_size, cutoff, now))
}

/// Handle a navigation control invocation: decode the embedded target page
/// and re-render it from current data
pub async fn handle_navigation(
    db: &Database,
    config: &DigestConfig,
    custom_id: &str,
) -> Result<Option<OutboundMessage>> {
    match parse_nav_token(custom_id) {
        Some(page) => render_current(db, config, page).await,
        None => Ok(None),
    }
}
