//! Read-only traversals that pick notable comments out of a comment forest.
//!
//! Every function walks the forest in pre-order (parent before children,
//! siblings left to right). When several comments reach the same maximum the
//! first one met in that order wins; rankings use stable sorts so equal keys
//! keep that order too.

use crate::models::Comment;

/// Flat pre-order view of a forest with parent links.
///
/// Positions are local to the slice the index was built from. For the root
/// comments of a [`crate::Thread`] they coincide with [`crate::CommentId`]s.
pub struct TreeIndex<'a> {
    nodes: Vec<&'a Comment>,
    parents: Vec<Option<usize>>,
}

impl<'a> TreeIndex<'a> {
    pub fn new(comments: &'a [Comment]) -> Self {
        let mut nodes = Vec::new();
        let mut parents = Vec::new();
        let mut stack: Vec<(&'a Comment, Option<usize>)> =
            comments.iter().rev().map(|c| (c, None)).collect();

        while let Some((comment, parent)) = stack.pop() {
            let position = nodes.len();
            nodes.push(comment);
            parents.push(parent);
            stack.extend(comment.replies().iter().rev().map(|r| (r, Some(position))));
        }

        Self { nodes, parents }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, position: usize) -> &'a Comment {
        self.nodes[position]
    }

    pub fn parent_position(&self, position: usize) -> Option<usize> {
        self.parents[position]
    }

    pub fn parent(&self, position: usize) -> Option<&'a Comment> {
        self.parents[position].map(|p| self.nodes[p])
    }

    pub fn is_root(&self, position: usize) -> bool {
        self.parents[position].is_none()
    }

    /// Number of descendants of every node, the node itself excluded.
    ///
    /// Children always sit after their parent in pre-order, so one reverse
    /// pass sees every subtree complete before it is added to its parent.
    pub fn descendant_counts(&self) -> Vec<i64> {
        let mut counts = vec![0i64; self.len()];
        for position in (0..self.len()).rev() {
            if let Some(parent) = self.parents[position] {
                counts[parent] += 1 + counts[position];
            }
        }
        counts
    }

    /// First node in pre-order reaching the maximum of `key`.
    fn first_max(&self, key: impl Fn(usize) -> i64) -> Standout<'a> {
        let mut best: Option<(usize, i64)> = None;
        for position in 0..self.len() {
            let value = key(position);
            if best.map_or(true, |(_, max)| value > max) {
                best = Some((position, value));
            }
        }

        match best {
            Some((position, value)) => Standout {
                comment: Some(self.nodes[position]),
                value,
                is_root: self.is_root(position),
            },
            None => Standout::empty(),
        }
    }
}

/// One comment singled out by a statistic.
///
/// An empty forest yields `(None, -1, false)`; that is a result, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standout<'a> {
    pub comment: Option<&'a Comment>,
    pub value: i64,
    pub is_root: bool,
}

impl<'a> Standout<'a> {
    pub fn empty() -> Self {
        Self {
            comment: None,
            value: -1,
            is_root: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.comment.is_none()
    }
}

/// A highly ranked comment and the comment it replied to (`None` for roots).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked<'a> {
    pub comment: &'a Comment,
    pub parent: Option<&'a Comment>,
}

/// A reply whose effective score beats the one of the comment it answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Improvement<'a> {
    pub parent: &'a Comment,
    pub grandparent: Option<&'a Comment>,
    pub child: &'a Comment,
}

impl Improvement<'_> {
    pub fn gain(&self) -> i64 {
        self.child.effective_score() - self.parent.effective_score()
    }
}

/// Highest raw score anywhere in the forest.
pub fn highest_score_comment(comments: &[Comment]) -> Standout<'_> {
    let index = TreeIndex::new(comments);
    index.first_max(|p| index.node(p).score())
}

/// Highest raw score among depth-0 comments only.
pub fn highest_score_root_comment(comments: &[Comment]) -> Standout<'_> {
    let mut best: Option<&Comment> = None;
    for comment in comments.iter().filter(|c| c.depth() == 0) {
        if best.map_or(true, |b| comment.score() > b.score()) {
            best = Some(comment);
        }
    }

    match best {
        Some(comment) => Standout {
            comment: Some(comment),
            value: comment.score(),
            is_root: true,
        },
        None => Standout::empty(),
    }
}

/// Comment with the most descendants, counted at every depth.
pub fn most_total_subcomments(comments: &[Comment]) -> Standout<'_> {
    let index = TreeIndex::new(comments);
    let counts = index.descendant_counts();
    index.first_max(|p| counts[p])
}

/// Comment with the most direct replies.
pub fn most_direct_subcomments(comments: &[Comment]) -> Standout<'_> {
    let index = TreeIndex::new(comments);
    index.first_max(|p| index.node(p).replies().len() as i64)
}

/// The `k` comments with the highest effective score, each with its parent.
pub fn top_k_by_effective_score(comments: &[Comment], k: usize) -> Vec<Ranked<'_>> {
    let index = TreeIndex::new(comments);
    let mut positions: Vec<usize> = (0..index.len()).collect();
    positions.sort_by(|&a, &b| {
        index
            .node(b)
            .effective_score()
            .cmp(&index.node(a).effective_score())
    });

    positions
        .into_iter()
        .take(k)
        .map(|p| Ranked {
            comment: index.node(p),
            parent: index.parent(p),
        })
        .collect()
}

/// Parent/child edges where the child out-scores its parent, best gain first.
///
/// Children with a raw score of exactly 1 are ignored: depth multiplication
/// alone lets them beat a weak parent without any votes.
pub fn important_pairs(comments: &[Comment], k: usize) -> Vec<Improvement<'_>> {
    let index = TreeIndex::new(comments);
    let mut pairs = Vec::new();

    for position in 0..index.len() {
        let Some(parent_position) = index.parent_position(position) else {
            continue;
        };
        let child = index.node(position);
        let parent = index.node(parent_position);

        if child.effective_score() > parent.effective_score() && child.score() != 1 {
            pairs.push(Improvement {
                parent,
                grandparent: index.parent(parent_position),
                child,
            });
        }
    }

    pairs.sort_by(|a, b| b.gain().cmp(&a.gain()));
    pairs.truncate(k);
    pairs
}
