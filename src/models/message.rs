//! Discord webhook payload built from an item.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{DeliveryConfig, Item, Source};

/// Destination limit on embed titles.
pub const MAX_TITLE_LENGTH: usize = 256;

/// Destination limit on embed author names.
pub const MAX_AUTHOR_LENGTH: usize = 256;

/// Destination limit on embed footer text.
pub const MAX_FOOTER_LENGTH: usize = 2048;

/// Marker appended to truncated text.
const ELLIPSIS: &str = "...";

/// Webhook execute payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    pub footer: EmbedFooter,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedImage {
    pub url: String,
}

impl WebhookMessage {
    /// Build the payload for `item`, applying the source's display overrides.
    pub fn build(source: &Source, item: &Item, delivery: &DeliveryConfig) -> Self {
        let title = if item.title.trim().is_empty() {
            "No Title".to_string()
        } else {
            truncate(item.title.trim(), MAX_TITLE_LENGTH)
        };

        let footer = item
            .origin_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&source.name);

        let embed = Embed {
            title,
            url: item.link.clone(),
            description: truncate(&item.body, delivery.max_description_length),
            color: source.embed_color.unwrap_or(delivery.default_color),
            timestamp: item.published.to_rfc3339(),
            footer: EmbedFooter {
                text: truncate(footer, MAX_FOOTER_LENGTH),
            },
            author: item.author.as_ref().map(|name| EmbedAuthor {
                name: truncate(name, MAX_AUTHOR_LENGTH),
            }),
            thumbnail: item
                .media_url
                .as_ref()
                .map(|url| EmbedImage { url: url.clone() }),
        };

        Self {
            username: source.webhook_name.clone(),
            avatar_url: source.webhook_avatar.clone(),
            embeds: vec![embed],
        }
    }
}

/// Cut `text` to at most `max` characters, ending with "..." when cut.
///
/// Never splits a grapheme cluster.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let budget = max.saturating_sub(ELLIPSIS.len());
    let mut used = 0;
    let mut out = String::with_capacity(text.len().min(max * 4));
    for grapheme in text.graphemes(true) {
        let width = grapheme.chars().count();
        if used + width > budget {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push_str(ELLIPSIS);
    out
}
