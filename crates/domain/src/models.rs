use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A comment as handed over by a fetcher, before validation and annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    pub author: Option<String>,
    pub score: Option<i64>,
    pub body: Option<String>,
    #[serde(default)]
    pub replies: Vec<RawComment>,
}

/// The opening post as handed over by a fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub author: Option<String>,
    pub score: Option<i64>,
    pub body: Option<String>,
    pub url: String,
    #[serde(default)]
    pub image_links: Vec<String>,
    #[serde(default)]
    pub extra_content_links: Vec<String>,
}

/// Everything a fetcher returns for one thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadData {
    pub title: String,
    pub post: RawPost,
    pub comments: Vec<RawComment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed thread: `{field}` missing on {path}")]
pub struct MalformedThreadError {
    pub path: String,
    pub field: &'static str,
}

/// Position of a comment in the pre-order walk of its thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(usize);

impl CommentId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    id: CommentId,
    author: String,
    score: i64,
    depth: u32,
    body: String,
    replies: Vec<Comment>,
}

impl Comment {
    pub fn id(&self) -> CommentId {
        self.id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    /// 0 for a direct reply to the post.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn replies(&self) -> &[Comment] {
        &self.replies
    }

    /// `score * (depth + 1)`: favours well received comments deep in a sub-thread.
    pub fn effective_score(&self) -> i64 {
        self.score * (i64::from(self.depth) + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    author: String,
    score: i64,
    body: String,
    url: String,
    image_links: Vec<String>,
    extra_content_links: Vec<String>,
}

impl Post {
    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn image_links(&self) -> &[String] {
        &self.image_links
    }

    pub fn extra_content_links(&self) -> &[String] {
        &self.extra_content_links
    }

    /// Post scores run higher than comment scores, so they are halved.
    pub fn effective_score(&self) -> f64 {
        self.score as f64 / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thread {
    title: String,
    post: Post,
    comments: Vec<Comment>,
}

impl Thread {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    /// Root comments, in display order.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Totals over the post and every comment.
    pub fn stats(&self) -> SubtreeStats {
        let mut stats = SubtreeStats {
            count: 1,
            total_score: self.post.score,
            total_effective_score: self.post.effective_score(),
        };
        for comment in &self.comments {
            stats += count_all(comment);
        }
        stats
    }
}

impl TryFrom<ThreadData> for Thread {
    type Error = MalformedThreadError;

    fn try_from(data: ThreadData) -> Result<Self, Self::Error> {
        build_thread(data.title, data.post, data.comments)
    }
}

/// Validates raw records and annotates every comment with its id and depth.
///
/// Ids follow a pre-order, parent-before-children, left-to-right walk, so a
/// parent's id is always smaller than the ids of its descendants.
pub fn build_thread(
    title: impl Into<String>,
    post: RawPost,
    comments: Vec<RawComment>,
) -> Result<Thread, MalformedThreadError> {
    let post = Post {
        author: require(post.author, "post", "author")?,
        score: require(post.score, "post", "score")?,
        body: require(post.body, "post", "body")?,
        url: post.url,
        image_links: post.image_links,
        extra_content_links: post.extra_content_links,
    };

    let mut next_id = 0;
    let comments = comments
        .into_iter()
        .enumerate()
        .map(|(i, raw)| annotate(raw, 0, format!("comments[{}]", i), &mut next_id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Thread {
        title: title.into(),
        post,
        comments,
    })
}

fn annotate(
    raw: RawComment,
    depth: u32,
    path: String,
    next_id: &mut usize,
) -> Result<Comment, MalformedThreadError> {
    let id = CommentId(*next_id);
    *next_id += 1;

    let author = require(raw.author, &path, "author")?;
    let score = require(raw.score, &path, "score")?;
    let body = require(raw.body, &path, "body")?;

    let replies = raw
        .replies
        .into_iter()
        .enumerate()
        .map(|(i, reply)| annotate(reply, depth + 1, format!("{}.replies[{}]", path, i), next_id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Comment {
        id,
        author,
        score,
        depth,
        body,
        replies,
    })
}

fn require<T>(value: Option<T>, path: &str, field: &'static str) -> Result<T, MalformedThreadError> {
    value.ok_or_else(|| MalformedThreadError {
        path: path.to_string(),
        field,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtreeStats {
    pub count: u64,
    pub total_score: i64,
    pub total_effective_score: f64,
}

impl std::ops::AddAssign for SubtreeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.count += rhs.count;
        self.total_score += rhs.total_score;
        self.total_effective_score += rhs.total_effective_score;
    }
}

/// Sums a comment and all of its descendants, visiting each node once.
pub fn count_all(node: &Comment) -> SubtreeStats {
    let mut stats = SubtreeStats::default();
    let mut stack = vec![node];
    while let Some(comment) = stack.pop() {
        stats.count += 1;
        stats.total_score += comment.score;
        stats.total_effective_score += comment.effective_score() as f64;
        stack.extend(comment.replies.iter());
    }
    stats
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn raw(author: &str, score: i64, replies: Vec<RawComment>) -> RawComment {
        RawComment {
            author: Some(author.to_string()),
            score: Some(score),
            body: Some(format!("body of {}", author)),
            replies,
        }
    }

    pub fn raw_post(score: i64) -> RawPost {
        RawPost {
            author: Some("op".to_string()),
            score: Some(score),
            body: Some("what do you think?".to_string()),
            url: "https://www.reddit.com/r/rust/comments/abc123/example/".to_string(),
            ..RawPost::default()
        }
    }

    /// Post (10); C1 (5) with replies C1a (20) and C1b (1); C2 (50).
    pub fn sample_thread() -> Thread {
        build_thread(
            "sample",
            raw_post(10),
            vec![
                raw("c1", 5, vec![raw("c1a", 20, vec![]), raw("c1b", 1, vec![])]),
                raw("c2", 50, vec![]),
            ],
        )
        .unwrap()
    }
}
