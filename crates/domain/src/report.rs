//! Serializable results of the tree analytics.
//!
//! Snapshots never carry `replies`, so a report stays small no matter how
//! large the subtree under a selected comment is.

use serde::{Deserialize, Serialize};

use crate::analytics::{self, Improvement, Ranked, Standout};
use crate::models::{Comment, CommentId, Thread};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSnapshot {
    pub id: CommentId,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub depth: u32,
    pub effective_score: i64,
}

impl From<&Comment> for CommentSnapshot {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.id(),
            author: c.author().to_string(),
            body: c.body().to_string(),
            score: c.score(),
            depth: c.depth(),
            effective_score: c.effective_score(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotableComment {
    pub comment: Option<CommentSnapshot>,
    pub value: i64,
    pub is_root: bool,
}

impl From<Standout<'_>> for NotableComment {
    fn from(s: Standout<'_>) -> Self {
        Self {
            comment: s.comment.map(CommentSnapshot::from),
            value: s.value,
            is_root: s.is_root,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedComment {
    pub comment: CommentSnapshot,
    pub parent: Option<CommentSnapshot>,
}

impl From<Ranked<'_>> for RankedComment {
    fn from(r: Ranked<'_>) -> Self {
        Self {
            comment: r.comment.into(),
            parent: r.parent.map(CommentSnapshot::from),
        }
    }
}

/// Parent side of an improvement pair, with one extra level of context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentContext {
    #[serde(flatten)]
    pub comment: CommentSnapshot,
    pub parent_comment: Option<CommentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovementPair {
    pub parent: ParentContext,
    pub child: CommentSnapshot,
    pub gain: i64,
}

impl From<Improvement<'_>> for ImprovementPair {
    fn from(i: Improvement<'_>) -> Self {
        Self {
            gain: i.gain(),
            parent: ParentContext {
                comment: i.parent.into(),
                parent_comment: i.grandparent.map(CommentSnapshot::from),
            },
            child: i.child.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeReport {
    pub highest_score: NotableComment,
    pub highest_score_root: NotableComment,
    pub most_subcomments: NotableComment,
    pub most_direct_subcomments: NotableComment,
    pub top_by_effective_score: Vec<RankedComment>,
    pub important_pairs: Vec<ImprovementPair>,
}

/// Runs every traversal over the thread's comments; the post is not ranked.
pub fn analyze_tree(thread: &Thread, k: usize) -> TreeReport {
    let comments = thread.comments();
    TreeReport {
        highest_score: analytics::highest_score_comment(comments).into(),
        highest_score_root: analytics::highest_score_root_comment(comments).into(),
        most_subcomments: analytics::most_total_subcomments(comments).into(),
        most_direct_subcomments: analytics::most_direct_subcomments(comments).into(),
        top_by_effective_score: analytics::top_k_by_effective_score(comments, k)
            .into_iter()
            .map(RankedComment::from)
            .collect(),
        important_pairs: analytics::important_pairs(comments, k)
            .into_iter()
            .map(ImprovementPair::from)
            .collect(),
    }
}
