pub mod analytics;
pub mod cache;
mod commands;
mod events;
mod models;
pub mod protocol;
mod report;

pub use cache::{
    AnalysisParams, CacheEntry, CacheKey, CacheLookup, CacheTable, Capabilities, Fingerprint,
    ParamError, SummaryLength, Tolerance, Tone, DEFAULT_SUMMARY_FOCUS, MAX_FOCUS_CHARS,
};
pub use commands::AppCommand;
pub use events::AnalysisEvent;
pub use models::{
    build_thread, count_all, Comment, CommentId, MalformedThreadError, Post, RawComment, RawPost,
    SubtreeStats, Thread, ThreadData,
};
pub use report::{
    analyze_tree, CommentSnapshot, ImprovementPair, NotableComment, ParentContext, RankedComment,
    TreeReport,
};
