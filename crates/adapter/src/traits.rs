use async_trait::async_trait;
use domain::{CacheEntry, ThreadData};
use serde::Serialize;
use serde_json::Value;
use storage::Db;

use crate::error::{FetchError, LlmError};

#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// Raw post and comment forest of the thread at `url`.
    async fn fetch_thread(&self, url: &str) -> Result<ThreadData, FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One completion. With a `schema` the reply is JSON text shaped by it.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        schema: Option<&Value>,
    ) -> Result<String, LlmError>;

    async fn describe_image(&self, image_url: &str, prompt: &str) -> Result<String, LlmError>;
}

#[async_trait]
pub trait PageReader: Send + Sync {
    /// Main readable text of a web page.
    async fn read_page(&self, url: &str) -> Result<String, FetchError>;
}

/// Whole-table persistence of the analysis cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Vec<CacheEntry>>;
    async fn save(&self, rows: &[CacheEntry]) -> anyhow::Result<()>;
}

#[async_trait]
impl CacheStore for Db {
    async fn load(&self) -> anyhow::Result<Vec<CacheEntry>> {
        self.load_analyses().await
    }

    async fn save(&self, rows: &[CacheEntry]) -> anyhow::Result<()> {
        self.save_analyses(rows).await
    }
}
