//! Forum thread strategy.
//!
//! Scrapes the posts of one thread page. Only the last page is read: new
//! replies are appended at the end of a thread, so earlier pages never
//! contain unseen posts once a source has been bootstrapped. A burst of
//! replies large enough to spill over more than one page between two polls
//! loses the posts on the pages in between.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Item, Source, ThreadConfig, content_digest};
use crate::services::FetchStrategy;
use crate::utils::http::fetch_text;
use crate::utils::text::clean_post;
use crate::utils::url::{extract_post_id, page_number, resolve, thread_base};

/// Title used when the page names no thread title.
const DEFAULT_TITLE: &str = "Thread Reply";

/// Compiled selectors for thread markup.
struct ThreadSelectors {
    post: Selector,
    author: Selector,
    time: Selector,
    body: Selector,
    permalink: Selector,
    avatar: Selector,
    title: Selector,
    page: Selector,
    head_title: Selector,
}

impl ThreadSelectors {
    fn compile(config: &ThreadConfig) -> Result<Self> {
        Ok(Self {
            post: parse_selector(&config.post_selector)?,
            author: parse_selector(&config.author_selector)?,
            time: parse_selector(&config.time_selector)?,
            body: parse_selector(&config.body_selector)?,
            permalink: parse_selector(&config.permalink_selector)?,
            avatar: parse_selector(&config.avatar_selector)?,
            title: parse_selector(&config.title_selector)?,
            page: parse_selector(&config.page_selector)?,
            head_title: parse_selector("title")?,
        })
    }
}

/// Fetches the last page of a forum thread and extracts its posts.
pub struct ThreadStrategy {
    client: reqwest::Client,
    selectors: ThreadSelectors,
    author_attr: String,
    strip_phrases: Vec<String>,
}

impl ThreadStrategy {
    pub fn new(client: reqwest::Client, config: &ThreadConfig) -> Result<Self> {
        Ok(Self {
            client,
            selectors: ThreadSelectors::compile(config)?,
            author_attr: config.author_attr.clone(),
            strip_phrases: config.strip_phrases.clone(),
        })
    }

    /// URL of the last page, when the page navigation names a later page
    /// than `page_url`.
    pub fn last_page_url(&self, html: &str, page_url: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let current = page_number(page_url).unwrap_or(1);

        document
            .select(&self.selectors.page)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| resolve(page_url, href))
            .filter_map(|url| page_number(&url).map(|n| (n, url)))
            .max_by_key(|(n, _)| *n)
            .filter(|(n, _)| *n > current)
            .map(|(_, url)| url)
    }

    /// Extract all posts of one page, in page order.
    pub fn parse_page(
        &self,
        html: &str,
        page_url: &str,
        context: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<Item>> {
        let document = Html::parse_document(html);
        let thread_title = self.thread_title(&document);
        let base = thread_base(page_url);

        let mut items = Vec::new();
        let mut containers = 0;
        for post in document.select(&self.selectors.post) {
            containers += 1;
            match self.parse_post(post, page_url, &base, fetched_at) {
                Ok(item) => items.push(match &thread_title {
                    Some(title) => {
                        let mut item = item.with_origin_title(title.clone());
                        item.title = title.clone();
                        item
                    }
                    None => item,
                }),
                Err(e) => log::warn!("Skipping post in {}: {}", context, e),
            }
        }

        if containers == 0 {
            return Err(AppError::fetch(
                context,
                format!("no posts found on {page_url}; not a thread page?"),
            ));
        }
        Ok(items)
    }

    fn thread_title(&self, document: &Html) -> Option<String> {
        document
            .select(&self.selectors.title)
            .next()
            .or_else(|| document.select(&self.selectors.head_title).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn parse_post(
        &self,
        post: ElementRef<'_>,
        page_url: &str,
        base: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Item> {
        let element = post.value();

        let author = element
            .attr(&self.author_attr)
            .map(str::to_string)
            .or_else(|| {
                post.select(&self.selectors.author)
                    .next()
                    .map(|el| el.text().collect::<String>())
            })
            .map(|a| a.trim().to_string())
            .unwrap_or_default();

        let time_el = post.select(&self.selectors.time).next();
        let raw_time = time_el
            .and_then(|el| el.value().attr("datetime").or(el.value().attr("data-time")))
            .unwrap_or_default();
        let published = time_el.and_then(parse_post_time).unwrap_or(fetched_at);

        let body = post
            .select(&self.selectors.body)
            .next()
            .map(|el| clean_post(&el.inner_html(), &self.strip_phrases))
            .unwrap_or_default();

        let permalink = post
            .select(&self.selectors.permalink)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| resolve(page_url, href))
            .find(|url| extract_post_id(url).is_some());

        let post_id = element
            .attr("data-content")
            .and_then(extract_post_id)
            .or_else(|| element.id().and_then(extract_post_id))
            .or_else(|| permalink.as_deref().and_then(extract_post_id));

        let (id, link) = match post_id {
            Some(id) => {
                let link = permalink.unwrap_or_else(|| format!("{base}post-{id}"));
                (id, link)
            }
            None if body.is_empty() => {
                return Err(AppError::extraction(
                    page_url,
                    "post has neither an identifier nor a body",
                ));
            }
            None => (
                content_digest(&[author.as_str(), raw_time, body.as_str()]),
                base.to_string(),
            ),
        };

        let avatar = post
            .select(&self.selectors.avatar)
            .next()
            .and_then(|img| img.value().attr("src"))
            .filter(|src| !src.starts_with("data:"))
            .map(|src| resolve(page_url, src));

        let mut item = Item::new(id, DEFAULT_TITLE)
            .with_author(author)
            .with_published(published)
            .with_body(body)
            .with_link(link);
        if let Some(avatar) = avatar {
            item = item.with_media_url(avatar);
        }
        Ok(item)
    }
}

#[async_trait]
impl FetchStrategy for ThreadStrategy {
    async fn fetch(&self, source: &Source) -> Result<Vec<Item>> {
        let first = fetch_text(&self.client, &source.url, &source.name).await?;

        let (html, page_url) = match self.last_page_url(&first, &source.url) {
            Some(last) => {
                log::debug!("{}: reading last page {}", source.name, last);
                let html = fetch_text(&self.client, &last, &source.name).await?;
                (html, last)
            }
            None => (first, source.url.clone()),
        };

        self.parse_page(&html, &page_url, &source.name, Utc::now())
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Read a post time from `datetime` (ISO 8601) or `data-time` (unix seconds).
fn parse_post_time(el: ElementRef<'_>) -> Option<DateTime<Utc>> {
    if let Some(raw) = el.value().attr("datetime") {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Some(naive.and_utc());
        }
    }
    el.value()
        .attr("data-time")
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn post(id: u32, author: &str, time: &str, body: &str) -> String {
        format!(
            r#"<article class="message message--post" data-author="{author}" data-content="post-{id}" id="js-post-{id}">
  <div class="message-avatar"><img src="/data/avatars/{author}.jpg" alt="{author}"></div>
  <header class="message-attribution">
    <ul class="message-attribution-main"><li><a href="/threads/topic.42/post-{id}"><time class="u-dt" datetime="{time}" data-time="0">x</time></a></li></ul>
  </header>
  <div class="message-body"><div class="bbWrapper">{body}</div></div>
</article>"#
        )
    }

    fn page(nav: &str, posts: &[String]) -> String {
        format!(
            r#"<html><head><title>Topic | Example Forum</title></head><body>
<h1 class="p-title-value">Topic &amp; Discussion</h1>
<div class="pageNav"><ul class="pageNav-main">{nav}</ul></div>
{}
</body></html>"#,
            posts.join("\n")
        )
    }

    fn nav(pages: u32) -> String {
        (1..=pages)
            .map(|n| {
                let href = if n == 1 {
                    "/threads/topic.42/".to_string()
                } else {
                    format!("/threads/topic.42/page-{n}")
                };
                format!(r#"<li class="pageNav-page"><a href="{href}">{n}</a></li>"#)
            })
            .collect()
    }

    fn strategy() -> ThreadStrategy {
        ThreadStrategy::new(reqwest::Client::new(), &ThreadConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_page_extracts_posts_in_order() {
        let html = page(
            "",
            &[
                post(10, "alice", "2025-03-01T10:00:00+0000", "First <b>reply</b>"),
                post(11, "bob", "2025-03-01T11:00:00+0000", "Second<br>reply"),
            ],
        );
        let items = strategy()
            .parse_page(&html, "https://forum.example/threads/topic.42/", "t", Utc::now())
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "10");
        assert_eq!(items[0].author.as_deref(), Some("alice"));
        assert_eq!(items[0].body, "First reply");
        assert_eq!(items[0].link, "https://forum.example/threads/topic.42/post-10");
        assert_eq!(
            items[0].media_url.as_deref(),
            Some("https://forum.example/data/avatars/alice.jpg")
        );
        assert_eq!(items[0].origin_title.as_deref(), Some("Topic & Discussion"));
        assert_eq!(
            items[0].published,
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(items[1].id, "11");
        assert_eq!(items[1].body, "Second\nreply");
    }

    #[test]
    fn test_post_without_id_uses_digest() {
        let html = page(
            "",
            &[r#"<article class="message--post" data-author="eve">
                <div class="message-body"><div class="bbWrapper">anonymous</div></div>
            </article>"#
                .to_string()],
        );
        let s = strategy();
        let first = s
            .parse_page(&html, "https://forum.example/threads/topic.42/", "t", Utc::now())
            .unwrap();
        let second = s
            .parse_page(&html, "https://forum.example/threads/topic.42/", "t", Utc::now())
            .unwrap();
        assert_eq!(first[0].id.len(), 64);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].link, "https://forum.example/threads/topic.42/");
    }

    #[test]
    fn test_unusable_post_skipped() {
        let html = page(
            "",
            &[
                r#"<article class="message--post"></article>"#.to_string(),
                post(12, "carol", "2025-03-02T09:00:00+0000", "kept"),
            ],
        );
        let items = strategy()
            .parse_page(&html, "https://forum.example/threads/topic.42/", "t", Utc::now())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "12");
    }

    #[test]
    fn test_page_without_posts_is_fetch_error() {
        let result = strategy().parse_page(
            "<html><body>login required</body></html>",
            "https://forum.example/threads/topic.42/",
            "t",
            Utc::now(),
        );
        assert!(matches!(result, Err(AppError::Fetch { .. })));
    }

    #[test]
    fn test_last_page_url() {
        let s = strategy();
        let html = page(&nav(3), &[]);
        assert_eq!(
            s.last_page_url(&html, "https://forum.example/threads/topic.42/"),
            Some("https://forum.example/threads/topic.42/page-3".to_string())
        );
        assert_eq!(
            s.last_page_url(&html, "https://forum.example/threads/topic.42/page-3"),
            None
        );
        assert_eq!(
            s.last_page_url(&page("", &[]), "https://forum.example/threads/topic.42/"),
            None
        );
    }

    #[test]
    fn test_data_time_fallback() {
        let html = r#"<time class="u-dt" data-time="1740823200">x</time>"#;
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("time").unwrap();
        let el = doc.select(&sel).next().unwrap();
        assert_eq!(
            parse_post_time(el),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_fetch_reads_last_page_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/topic.42/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(
                &nav(2),
                &[post(1, "op", "2025-03-01T08:00:00+0000", "opening post")],
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/topic.42/page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(
                &nav(2),
                &[
                    post(20, "alice", "2025-03-05T08:00:00+0000", "late reply"),
                    post(21, "bob", "2025-03-05T09:00:00+0000", "later reply"),
                ],
            )))
            .expect(1)
            .mount(&server)
            .await;

        let source = Source::new(
            "forum",
            format!("{}/threads/topic.42/", server.uri()),
            "https://hook",
        );
        let items = strategy().fetch(&source).await.unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["20", "21"]);
        assert_eq!(items[0].title, "Topic & Discussion");
    }
}
