//! Source descriptor: one monitored origin paired with one destination.

use serde::{Deserialize, Serialize};

/// Extraction strategy used for a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// RSS / Atom / JSON feed document
    #[default]
    #[serde(alias = "rss", alias = "atom")]
    Feed,

    /// Forum thread HTML page
    #[serde(alias = "xenforo", alias = "forum")]
    Thread,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Feed => "feed",
            StrategyKind::Thread => "thread",
        }
    }
}

/// A configured source. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// Unique source name; also the key of its seen-set
    #[serde(default)]
    pub name: String,

    /// Origin URL (feed document or thread page)
    pub url: String,

    /// Destination webhook URL
    pub webhook: String,

    /// Extraction strategy
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Sender name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_name: Option<String>,

    /// Sender avatar override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_avatar: Option<String>,

    /// Embed side-bar color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_color: Option<u32>,
}

impl Source {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        webhook: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            webhook: webhook.into(),
            strategy: StrategyKind::Feed,
            webhook_name: None,
            webhook_avatar: None,
            embed_color: None,
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_webhook_name(mut self, name: impl Into<String>) -> Self {
        self.webhook_name = Some(name.into());
        self
    }

    pub fn with_webhook_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.webhook_avatar = Some(avatar.into());
        self
    }

    pub fn with_embed_color(mut self, color: u32) -> Self {
        self.embed_color = Some(color);
        self
    }

    /// Key of this source in the seen-store.
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Fill in the name from the URL when the configuration omits it.
    pub(crate) fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            self.name = self.url.clone();
        }
        if self.webhook_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            self.webhook_name = None;
        }
        if self.webhook_avatar.as_deref().is_some_and(|a| a.trim().is_empty()) {
            self.webhook_avatar = None;
        }
    }
}
