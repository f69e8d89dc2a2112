//! In-process fakes of the collaborator traits.

use async_trait::async_trait;
use domain::{build_thread, CacheEntry, RawComment, RawPost, Thread, ThreadData};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{FetchError, LlmError};
use crate::traits::{CacheStore, ChatMessage, ChatModel, PageReader, ThreadSource};

pub const URL: &str = "https://www.reddit.com/r/rust/comments/abc123/example/";

fn comment(author: &str, score: i64, replies: Vec<RawComment>) -> RawComment {
    RawComment {
        author: Some(author.to_string()),
        score: Some(score),
        body: Some(format!("{} says hi", author)),
        replies,
    }
}

/// A post with `top_level` root comments of score 10, each with one reply of score 3.
pub fn thread_data(top_level: usize) -> ThreadData {
    ThreadData {
        title: "Is Rust worth learning?".to_string(),
        post: RawPost {
            author: Some("op".to_string()),
            score: Some(100),
            body: Some("Thinking about it.".to_string()),
            url: URL.to_string(),
            image_links: vec!["https://i.redd.it/cat.png".to_string()],
            extra_content_links: vec!["https://blog.example.com/post".to_string()],
        },
        comments: (0..top_level)
            .map(|i| comment(&format!("user{}", i), 10, vec![comment("replier", 3, vec![])]))
            .collect(),
    }
}

pub fn thread_with_links() -> Thread {
    let data = thread_data(3);
    build_thread(data.title, data.post, data.comments).unwrap()
}

pub struct FakeSource {
    data: Mutex<Option<ThreadData>>,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(data: ThreadData) -> Self {
        Self {
            data: Mutex::new(Some(data)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            data: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, data: ThreadData) {
        *self.data.lock().unwrap() = Some(data);
    }
}

#[async_trait]
impl ThreadSource for FakeSource {
    async fn fetch_thread(&self, url: &str) -> Result<ThreadData, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.data
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| FetchError::Exhausted {
                url: url.to_string(),
                attempts: 4,
                last: Box::new(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                }),
            })
    }
}

/// Schema calls answer `{"summary": "summary #n"}`; other calls answer plain text.
#[derive(Default)]
pub struct FakeChat {
    pub summaries: AtomicUsize,
    pub plain: AtomicUsize,
    pub images: AtomicUsize,
    pub fail_summary: AtomicBool,
    last_user: Mutex<String>,
}

impl FakeChat {
    pub fn last_user_message(&self) -> String {
        self.last_user.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        schema: Option<&Value>,
    ) -> Result<String, LlmError> {
        if schema.is_none() {
            let n = self.plain.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(format!("plain reply #{}", n));
        }
        if let Some(user) = messages.iter().find(|m| m.role == "user") {
            *self.last_user.lock().unwrap() = user.content.clone();
        }
        if self.fail_summary.load(Ordering::SeqCst) {
            return Err(LlmError::Api {
                status: 500,
                body: "overloaded".to_string(),
            });
        }
        // Widen the window in which concurrent requests could interleave.
        tokio::task::yield_now().await;
        let n = self.summaries.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "summary": format!("summary #{}", n) }).to_string())
    }

    async fn describe_image(&self, image_url: &str, _prompt: &str) -> Result<String, LlmError> {
        self.images.fetch_add(1, Ordering::SeqCst);
        if image_url.contains("broken") {
            return Err(LlmError::EmptyReply);
        }
        Ok(format!("picture of {}", image_url))
    }
}

pub struct FakePages;

#[async_trait]
impl PageReader for FakePages {
    async fn read_page(&self, url: &str) -> Result<String, FetchError> {
        if url.contains("down") {
            return Err(FetchError::NoContent {
                url: url.to_string(),
            });
        }
        Ok(format!("text of {}", url))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rows: tokio::sync::Mutex<Vec<CacheEntry>>,
    pub saves: AtomicUsize,
}

impl MemoryStore {
    pub async fn rows(&self) -> Vec<CacheEntry> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self) -> anyhow::Result<Vec<CacheEntry>> {
        Ok(self.rows.lock().await.clone())
    }

    async fn save(&self, rows: &[CacheEntry]) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.rows.lock().await = rows.to_vec();
        Ok(())
    }
}
