use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

use crate::models::{RawComment, RawPost, ThreadData};

const IMAGE_HOSTS: [&str; 3] = ["i.redd.it", "i.imgur.com", "preview.redd.it"];
const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];
const QUOTE_MARKER: &str = "&gt;";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("thread listing is not a two element array")]
    NotAListingPair,
    #[error("thread listing has no post")]
    MissingPost,
    #[error("thread listing has no comment section")]
    MissingComments,
}

fn thread_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://(www\.|old\.)?reddit\.com/r/[^/]+/comments/[A-Za-z0-9]+")
            .expect("thread url pattern is valid")
    })
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"https?://[^\s()\[\]<>"']+"#).expect("link pattern is valid")
    })
}

pub fn is_thread_url(url: &str) -> bool {
    thread_url_pattern().is_match(url.trim())
}

/// JSON endpoint for a thread url: query and fragment dropped, `.json` appended.
pub fn listing_url(url: &str) -> String {
    let url = url.trim();
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let base = url[..end].trim_end_matches('/');
    if base.ends_with(".json") {
        base.to_string()
    } else {
        format!("{}.json", base)
    }
}

/// Turns the two-listing JSON document served for a thread into raw records.
///
/// Element 0 carries the post, element 1 the comment forest. `more` stubs are
/// pagination placeholders and are skipped. Missing comment fields are left
/// as `None`; rejecting them is up to [`crate::build_thread`].
pub fn parse_listing(json: &Value) -> Result<ThreadData, ProtocolError> {
    let listings = json.as_array().ok_or(ProtocolError::NotAListingPair)?;
    if listings.len() < 2 {
        return Err(ProtocolError::NotAListingPair);
    }

    let post_data = children(&listings[0])
        .and_then(|c| c.first())
        .and_then(|c| c.get("data"))
        .ok_or(ProtocolError::MissingPost)?;
    let comment_children = children(&listings[1]).ok_or(ProtocolError::MissingComments)?;

    Ok(ThreadData {
        title: str_field(post_data, "title").unwrap_or_default(),
        post: parse_post(post_data),
        comments: comment_children.iter().filter_map(parse_comment).collect(),
    })
}

fn children(listing: &Value) -> Option<&Vec<Value>> {
    listing.get("data")?.get("children")?.as_array()
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_post(data: &Value) -> RawPost {
    let url = str_field(data, "url").unwrap_or_default();
    let selftext = str_field(data, "selftext");

    let mut image_links = Vec::new();
    let mut extra_content_links = Vec::new();

    if !url.is_empty() {
        if is_image_link(&url) {
            push_unique(&mut image_links, unescape(&url));
        } else if !is_reddit_link(&url) {
            push_unique(&mut extra_content_links, unescape(&url));
        }
    }
    for link in gallery_images(data).into_iter().chain(preview_images(data)) {
        push_unique(&mut image_links, link);
    }
    if let Some(text) = selftext.as_deref() {
        for m in link_pattern().find_iter(text) {
            let link = unescape(m.as_str());
            if is_image_link(&link) {
                push_unique(&mut image_links, link);
            } else if !is_reddit_link(&link) {
                push_unique(&mut extra_content_links, link);
            }
        }
    }

    RawPost {
        author: str_field(data, "author"),
        score: data.get("score").and_then(Value::as_i64),
        body: selftext.map(|s| mark_quotes(&s)),
        url,
        image_links,
        extra_content_links,
    }
}

fn parse_comment(child: &Value) -> Option<RawComment> {
    if child.get("kind").and_then(Value::as_str) == Some("more") {
        return None;
    }
    let data = child.get("data")?;
    if data.as_object().map_or(true, |o| o.is_empty()) {
        return None;
    }

    // `replies` is "" when empty and a listing otherwise.
    let replies = match data.get("replies") {
        Some(listing @ Value::Object(_)) => children(listing)
            .map(|c| c.iter().filter_map(parse_comment).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    Some(RawComment {
        author: str_field(data, "author"),
        score: data.get("score").and_then(Value::as_i64),
        body: str_field(data, "body").map(|b| mark_quotes(&b)),
        replies,
    })
}

/// Rewrites `&gt;` quoted lines as `Quoted Part: '...'`.
pub fn mark_quotes(body: &str) -> String {
    if !body.contains(QUOTE_MARKER) {
        return body.to_string();
    }

    body.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            match trimmed.strip_prefix(QUOTE_MARKER) {
                Some(quoted) => format!("Quoted Part: '{}'", quoted.trim()),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn gallery_images(data: &Value) -> Vec<String> {
    let Some(metadata) = data.get("media_metadata").and_then(Value::as_object) else {
        return Vec::new();
    };

    let ordered_ids: Vec<&str> = data
        .pointer("/gallery_data/items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get("media_id").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_else(|| metadata.keys().map(String::as_str).collect());

    ordered_ids
        .into_iter()
        .filter_map(|id| {
            let media = metadata.get(id)?;
            if let Some(u) = media.pointer("/s/u").and_then(Value::as_str) {
                return Some(unescape(u));
            }
            let mime = media.get("m").and_then(Value::as_str)?;
            let ext = mime.strip_prefix("image/")?;
            Some(format!("https://i.redd.it/{}.{}", id, ext))
        })
        .collect()
}

fn preview_images(data: &Value) -> Vec<String> {
    data.pointer("/preview/images")
        .and_then(Value::as_array)
        .map(|images| {
            images
                .iter()
                .filter_map(|i| i.pointer("/source/url").and_then(Value::as_str))
                .map(unescape)
                .collect()
        })
        .unwrap_or_default()
}

fn host(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    rest.split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn is_image_link(url: &str) -> bool {
    let host = host(url);
    if IMAGE_HOSTS.contains(&host.as_str()) {
        return true;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn is_reddit_link(url: &str) -> bool {
    let host = host(url);
    host == "reddit.com" || host.ends_with(".reddit.com") || host == "redd.it" || host.ends_with(".redd.it")
}

fn unescape(url: &str) -> String {
    url.replace("&amp;", "&")
}

fn push_unique(links: &mut Vec<String>, link: String) {
    if !links.contains(&link) {
        links.push(link);
    }
}
