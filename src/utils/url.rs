// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
///
/// # Examples
/// ```
/// use feedhook::utils::url::resolve;
///
/// assert_eq!(
///     resolve("https://forum.example/threads/a.1/page-2", "/threads/a.1/post-9"),
///     "https://forum.example/threads/a.1/post-9"
/// );
/// ```
pub fn resolve(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Canonical thread URL with any `page-N` segment, query and fragment
/// removed, always ending in `/`.
///
/// # Examples
/// ```
/// use feedhook::utils::url::thread_base;
///
/// assert_eq!(
///     thread_base("https://forum.example/threads/topic.42/page-7?x=1#post-5"),
///     "https://forum.example/threads/topic.42/"
/// );
/// ```
pub fn thread_base(thread_url: &str) -> String {
    let Ok(mut parsed) = Url::parse(thread_url) else {
        return thread_url.to_string();
    };
    parsed.set_query(None);
    parsed.set_fragment(None);

    let segments: Vec<String> = parsed
        .path_segments()
        .map(|segs| {
            segs.filter(|s| !s.is_empty() && !is_page_segment(s))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let path = if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    };
    parsed.set_path(&path);
    parsed.to_string()
}

/// Page number encoded in a thread URL (`.../page-N`), if any.
pub fn page_number(thread_url: &str) -> Option<u32> {
    let parsed = Url::parse(thread_url).ok()?;
    parsed
        .path_segments()?
        .filter_map(|s| s.strip_prefix("page-"))
        .last()?
        .parse()
        .ok()
}

fn is_page_segment(segment: &str) -> bool {
    segment
        .strip_prefix("page-")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Extract a numeric post identifier from markers such as `post-123`,
/// `js-post-123` or a permalink ending in `/post-123`.
pub fn extract_post_id(marker: &str) -> Option<String> {
    let tail = marker.trim_end_matches('/');
    let idx = tail.rfind("post-")?;
    let digits: String = tail[idx + "post-".len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() { None } else { Some(digits) }
}
