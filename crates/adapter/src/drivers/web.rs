use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::common::retry::RetryPolicy;
use crate::error::FetchError;
use crate::traits::PageReader;

/// Elements whose text counts as page content.
const TEXT_ELEMENTS: &str = "h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, td";
/// Candidate content containers, most specific first.
const CONTAINERS: [&str; 4] = ["article", "main", "[role=main]", "body"];
const GITHUB_README: &str = "article.markdown-body";

pub struct WebPageReader {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl WebPageReader {
    pub fn new(user_agent: &str, timeout_secs: u64, retry: RetryPolicy) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http, retry })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.http.get(url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(http_err)
    }
}

#[async_trait]
impl PageReader for WebPageReader {
    async fn read_page(&self, url: &str) -> Result<String, FetchError> {
        let html = self.retry.run(url, || self.fetch_html(url)).await?;
        let text = extract_main_text(&html, url).ok_or_else(|| FetchError::NoContent {
            url: url.to_string(),
        })?;
        debug!("Extracted {} characters from {}", text.len(), url);
        Ok(text)
    }
}

fn is_github(url: &str) -> bool {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let host = rest.split('/').next().unwrap_or("").to_ascii_lowercase();
    host == "github.com" || host == "www.github.com"
}

/// Readable text of the main content block, whitespace collapsed.
///
/// GitHub pages only count their rendered README.
pub fn extract_main_text(html: &str, url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let text_selector = Selector::parse(TEXT_ELEMENTS).ok()?;

    let containers: &[&str] = if is_github(url) {
        &[GITHUB_README]
    } else {
        &CONTAINERS
    };

    for container in containers {
        let Ok(selector) = Selector::parse(container) else {
            continue;
        };
        let Some(root) = document.select(&selector).next() else {
            continue;
        };

        // An element's text already holds its descendants, so only the
        // outermost matching block below `root` is kept.
        let blocks: Vec<String> = root
            .select(&text_selector)
            .filter(|el| {
                !el.ancestors()
                    .take_while(|node| node.id() != root.id())
                    .filter_map(ElementRef::wrap)
                    .any(|ancestor| text_selector.matches(&ancestor))
            })
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        if !blocks.is_empty() {
            return Some(blocks.join("\n"));
        }
    }
    None
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
