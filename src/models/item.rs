//! Normalized item produced by a strategy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single piece of content extracted from a source during a poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Stable identifier, unique within its source
    pub id: String,

    /// Item title
    pub title: String,

    /// Author name, when the origin provides one
    pub author: Option<String>,

    /// Published / posted time
    pub published: DateTime<Utc>,

    /// Cleaned body text
    pub body: String,

    /// Canonical link
    pub link: String,

    /// Media or avatar image URL
    pub media_url: Option<String>,

    /// Title of the feed or thread the item came from
    pub origin_title: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: None,
            published: Utc::now(),
            body: String::new(),
            link: String::new(),
            media_url: None,
            origin_title: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        self.author = if author.trim().is_empty() {
            None
        } else {
            Some(author.trim().to_string())
        };
        self
    }

    pub fn with_published(mut self, published: DateTime<Utc>) -> Self {
        self.published = published;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn with_origin_title(mut self, title: impl Into<String>) -> Self {
        self.origin_title = Some(title.into());
        self
    }
}

/// Derive a stable identifier from content when the origin provides none.
pub fn content_digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}
