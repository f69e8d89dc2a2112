use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    Started {
        url: String,
    },
    CacheHit {
        url: String,
        index: usize,
    },
    Eli5Patched {
        url: String,
        index: usize,
    },
    Completed {
        url: String,
        from_cache: bool,
    },
    Failed {
        url: String,
        reason: String,
    },
}

impl AnalysisEvent {
    pub fn url(&self) -> &str {
        match self {
            Self::Started { url }
            | Self::CacheHit { url, .. }
            | Self::Eli5Patched { url, .. }
            | Self::Completed { url, .. }
            | Self::Failed { url, .. } => url,
        }
    }
}
