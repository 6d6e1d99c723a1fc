use chrono::Utc;

use super::message::{
    ActionRow, Button, Embed, EmbedAuthor, EmbedField, EmbedFooter, EmbedImage, OutboundMessage,
};
use super::Notifier;
use crate::config::NotifyConfig;
use crate::ingest::Candidate;
use crate::storage::{Article, WireArticle};

const KABUTAN_ICON: &str = "https://kabutan.jp/favicon.ico";
const TRADERS_ICON: &str = "https://www.traders.co.jp/static/favicon.ico?m=1642666535";

/// Character budget for urgent body text
const URGENT_BODY_BUDGET: usize = 512;

/// Embed accent color per article category. Unknown categories fall back
/// to green for regular events and red for urgent ones.
fn category_color(category: &str) -> Option<u32> {
    match category {
        "決算" => Some(0xFF4500),
        "決算修正" => Some(0xFF6347),
        "市場速報" => Some(0x00BFFF),
        "トレーダーズ" => Some(0x0099FF),
        _ => None,
    }
}

pub fn event_color(category: &str) -> u32 {
    category_color(category).unwrap_or(0x00FF00)
}

pub fn urgent_color(category: &str) -> u32 {
    category_color(category).unwrap_or(0xFF0000)
}

/// Truncate to a character budget, appending an ellipsis when cut
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut)
}

/// Urgent items go to their own channel when one is configured
pub fn urgent_destination(config: &NotifyConfig) -> &str {
    match config.urgent_channel.as_deref() {
        Some(channel) if !channel.is_empty() => channel,
        _ => &config.alert_channel,
    }
}

/// One event message for a newly persisted market article
pub fn build_event_message(article: &Article) -> OutboundMessage {
    let embed = Embed {
        author: Some(EmbedAuthor {
            name: format!("📢 市場速報 - {}", article.category),
            icon_url: Some(KABUTAN_ICON.to_string()),
        }),
        title: Some(article.title.clone()),
        url: Some(article.url.clone()),
        description: Some(format!("**カテゴリ**: {}", article.category)),
        fields: vec![EmbedField {
            name: "公開日時".to_string(),
            value: article.published_at.to_rfc3339(),
            inline: true,
        }],
        color: Some(event_color(&article.category)),
        timestamp: Some(article.published_at.to_rfc3339()),
        footer: Some(EmbedFooter {
            text: format!("Powered by zaraba {}", env!("CARGO_PKG_VERSION")),
            icon_url: Some(KABUTAN_ICON.to_string()),
        }),
        thumbnail: Some(EmbedImage {
            url: KABUTAN_ICON.to_string(),
        }),
        ..Default::default()
    };

    OutboundMessage {
        embeds: vec![embed],
        components: vec![ActionRow::new(vec![Button::link("続きを読む", &article.url)])],
        ..Default::default()
    }
}

/// Urgent disclosure message, with the stock chart attached when the
/// listing carried a stock code
pub fn build_urgent_message(article: &Article, candidate: &Candidate) -> OutboundMessage {
    let mut fields = Vec::new();
    if let Some(code) = &candidate.stock_code {
        fields.push(EmbedField {
            name: "銘柄コード".to_string(),
            value: code.clone(),
            inline: true,
        });
    }
    fields.push(EmbedField {
        name: "発表時刻".to_string(),
        value: article.published_at.to_rfc3339(),
        inline: true,
    });

    let image = candidate.stock_code.as_ref().map(|code| EmbedImage {
        url: format!(
            "https://funit.api.kabutan.jp/jp/chart?c={}&a=1&s=1&m=1&v={}",
            code,
            Utc::now().timestamp()
        ),
    });

    let embed = Embed {
        author: Some(EmbedAuthor {
            name: format!("🚨 速報 - {}", article.category),
            icon_url: Some(KABUTAN_ICON.to_string()),
        }),
        title: Some(article.title.clone()),
        url: Some(article.url.clone()),
        description: candidate
            .body
            .as_deref()
            .map(|body| truncate(body, URGENT_BODY_BUDGET)),
        fields,
        color: Some(urgent_color(&article.category)),
        timestamp: Some(article.published_at.to_rfc3339()),
        footer: Some(EmbedFooter {
            text: env!("CARGO_PKG_VERSION").to_string(),
            icon_url: Some(KABUTAN_ICON.to_string()),
        }),
        image,
        thumbnail: Some(EmbedImage {
            url: KABUTAN_ICON.to_string(),
        }),
    };

    OutboundMessage {
        embeds: vec![embed],
        components: vec![ActionRow::new(vec![Button::link("記事を読む", &article.url)])],
        ..Default::default()
    }
}

/// One event message for a newly persisted wire article
pub fn build_wire_message(article: &WireArticle) -> OutboundMessage {
    let embed = Embed {
        author: Some(EmbedAuthor {
            name: "📰 Traders ニュース".to_string(),
            icon_url: Some(TRADERS_ICON.to_string()),
        }),
        title: Some(article.title.clone()),
        url: Some(article.url.clone()),
        description: Some("最新トレーダーズニュースを配信します".to_string()),
        fields: vec![EmbedField {
            name: "公開日時".to_string(),
            value: article.published_at.to_rfc3339(),
            inline: true,
        }],
        color: Some(event_color(&article.category)),
        timestamp: Some(article.published_at.to_rfc3339()),
        footer: Some(EmbedFooter {
            text: format!("Powered by zaraba {}", env!("CARGO_PKG_VERSION")),
            icon_url: Some(TRADERS_ICON.to_string()),
        }),
        thumbnail: Some(EmbedImage {
            url: TRADERS_ICON.to_string(),
        }),
        ..Default::default()
    };

    OutboundMessage {
        embeds: vec![embed],
        components: vec![ActionRow::new(vec![Button::link("記事へ", &article.url)])],
        ..Default::default()
    }
}

/// Deliver event messages for a batch of newly stored articles. Delivery
/// failures are logged and never unwind the already-committed inserts.
pub async fn notify_new(notifier: &Notifier, config: &NotifyConfig, articles: &[Article]) {
    for article in articles {
        if let Err(e) = notifier
            .send(&config.alert_channel, &build_event_message(article))
            .await
        {
            tracing::error!("Failed to deliver event notification: {}", e);
        }
    }
}

/// Deliver urgent notifications. Only candidates the source flagged as
/// urgent are eligible; everything else is silently excluded here.
pub async fn notify_urgent(
    notifier: &Notifier,
    config: &NotifyConfig,
    items: &[(Article, Candidate)],
) {
    let destination = urgent_destination(config);

    for (article, candidate) in items {
        if !candidate.urgent {
            continue;
        }
        if let Err(e) = notifier
            .send(destination, &build_urgent_message(article, candidate))
            .await
        {
            tracing::error!("Failed to deliver urgent notification: {}", e);
        }
    }
}

/// Deliver event messages for newly stored wire articles
pub async fn notify_wire(notifier: &Notifier, config: &NotifyConfig, articles: &[WireArticle]) {
    for article in articles {
        if let Err(e) = notifier
            .send(&config.alert_channel, &build_wire_message(article))
            .await
        {
            tracing::error!("Failed to deliver wire notification: {}", e);
        }
    }
}
