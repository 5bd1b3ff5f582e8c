use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::UserSummary;

/// A comment as stored inside its post, in append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: i64,
    pub body: String,
    pub reaction: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A comment with its direct replies, in the order they were posted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(comment: Comment) -> Self {
        Self {
            comment,
            children: Vec::new(),
        }
    }

    /// Number of comments in this subtree, the node itself included.
    pub fn subtree_len(&self) -> usize {
        let mut total = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            total += 1;
            pending.extend(node.children.iter());
        }
        total
    }
}

#[derive(Debug, Serialize)]
pub struct CommentThread {
    pub total: usize,
    pub comments: Vec<CommentNode>,
    pub authors: Vec<UserSummary>,
}

#[derive(Debug, Deserialize)]
pub struct CreateComment {
    #[serde(alias = "comment")]
    pub body: String,
    pub reaction: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: UserSummary,
}
