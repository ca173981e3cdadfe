//! RSS / Atom feed strategy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;

use crate::error::{AppError, Result};
use crate::models::{Item, Source, content_digest};
use crate::services::FetchStrategy;
use crate::utils::http::fetch_bytes;
use crate::utils::text::{clean_html, decode_entities};

/// Fetches a feed document and normalizes its entries.
pub struct FeedStrategy {
    client: reqwest::Client,
}

impl FeedStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for FeedStrategy {
    async fn fetch(&self, source: &Source) -> Result<Vec<Item>> {
        let bytes = fetch_bytes(&self.client, &source.url, &source.name).await?;
        parse_feed(&bytes, &source.name, Utc::now())
    }
}

/// Parse a feed document into items, oldest first.
///
/// Feeds list entries newest first, so the document order is reversed.
pub fn parse_feed(bytes: &[u8], context: &str, fetched_at: DateTime<Utc>) -> Result<Vec<Item>> {
    // Leave missing entry ids empty; the fallbacks in `entry_to_item` are
    // stable across polls, unlike the parser's generated UUIDs.
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)
        .map_err(|e| AppError::fetch(context, format!("not a feed document: {e}")))?;

    let origin_title = feed
        .title
        .map(|t| decode_entities(&t.content))
        .filter(|t| !t.is_empty());

    let items = feed
        .entries
        .into_iter()
        .rev()
        .map(|entry| entry_to_item(entry, origin_title.as_deref(), fetched_at))
        .collect();
    Ok(items)
}

fn entry_to_item(entry: Entry, origin_title: Option<&str>, fetched_at: DateTime<Utc>) -> Item {
    let raw_title = entry.title.map(|t| t.content).unwrap_or_default();
    let title = decode_entities(&raw_title);

    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone())
        .unwrap_or_default();

    let body_html = entry
        .summary
        .map(|t| t.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();
    let body = clean_html(&body_html);

    let id = [entry.id.trim(), link.as_str(), raw_title.trim()]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| content_digest(&[title.as_str(), link.as_str(), body.as_str()]));

    let media = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .find(|uri| !uri.is_empty());

    let mut item = Item::new(id, if title.is_empty() { "No Title".to_string() } else { title })
        .with_link(link)
        .with_body(body)
        .with_published(entry.published.or(entry.updated).unwrap_or(fetched_at));

    if let Some(author) = entry.authors.first() {
        item = item.with_author(author.name.clone());
    }
    if let Some(media) = media {
        item = item.with_media_url(media);
    }
    if let Some(title) = origin_title {
        item = item.with_origin_title(title);
    }
    item
}
