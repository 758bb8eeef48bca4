//! Field extraction from rendered MyBB pages.
//!
//! Everything here works on plain HTML strings so it can be exercised without
//! a server. Selectors follow the default MyBB theme markup.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{Post, PostId, ThreadId};
use crate::constants::{POST_HASH_FIELD, POST_KEY_FIELD};

static POST_CONTAINER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[id^="post_"]"#).expect("Invalid selector"));
static USERNAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".username").expect("Invalid selector"));
static STRONG: Lazy<Selector> = Lazy::new(|| Selector::parse("strong").expect("Invalid selector"));
static POST_BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".post_body").expect("Invalid selector"));
static META_REFRESH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[http-equiv]").expect("Invalid selector"));
static ERROR_ITEMS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.error li").expect("Invalid selector"));

// `thread-42.html`, `thread-42-page-2.html`, `thread-42-post-7.html`
static SEO_THREAD_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^thread-(\d+)(?:[-.]|$)").expect("Invalid regex"));

/// Hidden tokens a MyBB form must echo back on submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormTokens {
    /// `my_post_key`, MyBB's per-session CSRF token.
    pub post_key: Option<String>,
    /// `posthash`, identifies the draft attachments bucket.
    pub post_hash: Option<String>,
}

/// Read the hidden form tokens from a page.
#[must_use]
pub fn form_tokens(html: &str) -> FormTokens {
    let document = Html::parse_document(html);
    FormTokens {
        post_key: input_value(&document, POST_KEY_FIELD),
        post_hash: input_value(&document, POST_HASH_FIELD),
    }
}

fn input_value(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"input[name="{name}"]"#)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(ToString::to_string)
}

/// Extract every post rendered on a thread page, in page order.
///
/// A post is a `div` whose id is `post_<digits>`. The author comes from the
/// first `.username` (or `strong`) inside it and the content from `#pid_<id>`
/// (or `.post_body`).
#[must_use]
pub fn extract_posts(html: &str) -> Vec<Post> {
    let document = Html::parse_document(html);
    let mut posts = Vec::new();

    for container in document.select(&POST_CONTAINER) {
        let Some(id) = container
            .value()
            .id()
            .and_then(|id| id.strip_prefix("post_"))
            .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|rest| rest.parse::<PostId>().ok())
        else {
            continue;
        };

        let author = container
            .select(&USERNAME)
            .next()
            .or_else(|| container.select(&STRONG).next())
            .map_or_else(|| "Unknown".to_string(), |el| joined_text(el, ""));

        let body = Selector::parse(&format!("#pid_{id}"))
            .ok()
            .and_then(|selector| container.select(&selector).next())
            .or_else(|| container.select(&POST_BODY).next());
        let content = body.map(|el| joined_text(el, "\n")).unwrap_or_default();

        posts.push(Post {
            id,
            author,
            content,
        });
    }

    posts
}

/// Trimmed, non-empty text nodes of `element` joined by `separator`.
fn joined_text(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Target of a `<meta http-equiv="refresh" content="N;URL=...">` tag, if any.
#[must_use]
pub fn meta_refresh_target(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&META_REFRESH)
        .filter(|meta| {
            meta.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
        })
        .find_map(|meta| {
            let content = meta.value().attr("content")?;
            let start = content.to_ascii_lowercase().rfind("url=")? + "url=".len();
            let target = content[start..].trim().trim_matches(|c| c == '\'' || c == '"');
            (!target.is_empty()).then(|| target.to_string())
        })
}

/// Messages from MyBB's inline "please correct the following errors" block.
#[must_use]
pub fn error_messages(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ERROR_ITEMS)
        .map(|item| {
            item.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|msg| !msg.is_empty())
        .collect()
}

/// Numeric query parameter `name` of `url`.
#[must_use]
pub fn id_param(url: &Url, name: &str) -> Option<u64> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .and_then(|(_, value)| value.parse().ok())
}

/// Thread id referenced by a forum URL.
///
/// Tries the `tid` query parameter, then a `thread-<n>` SEO segment, then a
/// numeric segment following `thread`/`threads` (e.g. `/thread/42`).
#[must_use]
pub fn thread_id_from_url(url: &Url) -> Option<ThreadId> {
    if let Some(tid) = id_param(url, "tid") {
        return Some(tid);
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if let Some(tid) = segments.iter().find_map(|seg| {
        SEO_THREAD_SEGMENT
            .captures(seg)
            .and_then(|caps| caps[1].parse().ok())
    }) {
        return Some(tid);
    }

    segments.windows(2).find_map(|pair| {
        matches!(pair[0], "thread" | "threads")
            .then(|| pair[1].parse().ok())
            .flatten()
    })
}
