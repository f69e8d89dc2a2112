use domain::{AnalysisParams, Thread};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::prompts::{self, ELI5_SYSTEM_PROMPT, IMAGE_PROMPT, MAX_PAGE_CHARS, PAGE_SYSTEM_PROMPT};
use crate::traits::{ChatMessage, ChatModel, PageReader};

/// Stand-in text for one image or link the model could not handle.
pub fn failure_placeholder(item: &str) -> String {
    format!("[analysis failed for {}]", item)
}

/// Drives the LLM calls of one analysis.
///
/// Image and link calls are independent and run concurrently; a failed one
/// degrades to [`failure_placeholder`] without affecting its siblings. Only a
/// failure of the thread summary itself is an error.
pub struct Summarizer {
    chat: Arc<dyn ChatModel>,
    pages: Arc<dyn PageReader>,
}

impl Summarizer {
    pub fn new(chat: Arc<dyn ChatModel>, pages: Arc<dyn PageReader>) -> Self {
        Self { chat, pages }
    }

    pub async fn summarize(&self, thread: &Thread, params: &AnalysisParams) -> Result<String, LlmError> {
        let post = thread.post();
        let images: &[String] = if params.analyze_image { post.image_links() } else { &[] };
        let links: &[String] = if params.search_external {
            post.extra_content_links()
        } else {
            &[]
        };

        let (image_notes, page_notes) =
            tokio::join!(self.describe_images(images), self.summarize_pages(links));

        let context = json!({
            "title": thread.title(),
            "original_post": {
                "author": post.author(),
                "score": post.score(),
                "body": post.body(),
                "url": post.url(),
            },
            "image_descriptions": paired(images, image_notes),
            "linked_pages": paired(links, page_notes),
            "comments": thread.comments(),
        });

        let messages = vec![
            ChatMessage::system(prompts::summary_system_prompt(params)),
            ChatMessage::user(serde_json::to_string_pretty(&context)?),
        ];
        let reply = self
            .chat
            .complete(messages, Some(&prompts::summary_schema()))
            .await?;

        let value: Value = serde_json::from_str(&reply)?;
        value
            .get("summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(LlmError::MissingField("summary"))
    }

    /// Plain-language rewrite of a finished analysis.
    pub async fn eli5(&self, analysis: &str) -> Result<String, LlmError> {
        let messages = vec![
            ChatMessage::system(ELI5_SYSTEM_PROMPT),
            ChatMessage::user(analysis),
        ];
        self.chat.complete(messages, None).await
    }

    pub(crate) async fn describe_images(&self, links: &[String]) -> Vec<String> {
        join_all(links.iter().map(|link| async move {
            match self.chat.describe_image(link, IMAGE_PROMPT).await {
                Ok(description) => description,
                Err(e) => {
                    warn!("Image analysis failed for {}: {}", link, e);
                    failure_placeholder(link)
                }
            }
        }))
        .await
    }

    pub(crate) async fn summarize_pages(&self, links: &[String]) -> Vec<String> {
        join_all(links.iter().map(|link| async move {
            match self.summarize_page(link).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!("External page analysis failed for {}: {}", link, e);
                    failure_placeholder(link)
                }
            }
        }))
        .await
    }

    async fn summarize_page(&self, link: &str) -> anyhow::Result<String> {
        let text = self.pages.read_page(link).await?;
        debug!("Summarizing {} characters from {}", text.len(), link);
        let messages = vec![
            ChatMessage::system(PAGE_SYSTEM_PROMPT),
            ChatMessage::user(prompts::clip(&text, MAX_PAGE_CHARS)),
        ];
        Ok(self.chat.complete(messages, None).await?)
    }
}

fn paired(links: &[String], notes: Vec<String>) -> Vec<Value> {
    links
        .iter()
        .zip(notes)
        .map(|(url, note)| json!({ "url": url, "content": note }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{thread_with_links, FakeChat, FakePages};
    use std::sync::atomic::Ordering;

    fn summarizer(chat: Arc<FakeChat>) -> Summarizer {
        Summarizer::new(chat, Arc::new(FakePages))
    }

    #[tokio::test]
    async fn failed_images_become_placeholders() {
        let chat = Arc::new(FakeChat::default());
        let links = vec![
            "https://i.redd.it/ok.png".to_string(),
            "https://i.redd.it/broken.png".to_string(),
        ];

        let notes = summarizer(chat.clone()).describe_images(&links).await;

        assert_eq!(notes[0], "picture of https://i.redd.it/ok.png");
        assert_eq!(notes[1], "[analysis failed for https://i.redd.it/broken.png]");
        assert_eq!(chat.images.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreadable_pages_become_placeholders() {
        let chat = Arc::new(FakeChat::default());
        let links = vec![
            "https://down.example.com/".to_string(),
            "https://blog.example.com/post".to_string(),
        ];

        let notes = summarizer(chat).summarize_pages(&links).await;

        assert_eq!(notes[0], "[analysis failed for https://down.example.com/]");
        assert!(!notes[1].starts_with("[analysis failed"));
    }

    #[tokio::test]
    async fn summary_skips_stages_that_were_not_requested() {
        let chat = Arc::new(FakeChat::default());
        let thread = thread_with_links();
        let mut params = AnalysisParams::new(crate::testing::URL);
        params.analyze_image = false;
        params.search_external = false;

        let summary = summarizer(chat.clone()).summarize(&thread, &params).await.unwrap();

        assert!(summary.starts_with("summary #"));
        assert_eq!(chat.images.load(Ordering::SeqCst), 0);
        assert_eq!(chat.plain.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn summary_sees_images_and_pages_when_requested() {
        let chat = Arc::new(FakeChat::default());
        let thread = thread_with_links();
        let mut params = AnalysisParams::new(crate::testing::URL);
        params.search_external = true;

        summarizer(chat.clone()).summarize(&thread, &params).await.unwrap();

        assert_eq!(chat.images.load(Ordering::SeqCst), 1);
        assert_eq!(chat.plain.load(Ordering::SeqCst), 1);
        let prompt = chat.last_user_message();
        assert!(prompt.contains("picture of https://i.redd.it/cat.png"));
        assert!(prompt.contains("\"linked_pages\""));
    }

    #[tokio::test]
    async fn failed_summary_is_an_error() {
        let chat = Arc::new(FakeChat::default());
        chat.fail_summary.store(true, Ordering::SeqCst);
        let params = AnalysisParams::new(crate::testing::URL);

        let result = summarizer(chat).summarize(&thread_with_links(), &params).await;
        assert!(matches!(result, Err(LlmError::Api { .. })));
    }
}
