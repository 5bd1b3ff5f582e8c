use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use super::comment::Comment;
use super::user::UserSummary;

/// Post aggregate. Likes and comments are embedded and always loaded and
/// saved together with the post row.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub author_id: i64,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub views: i64,
    pub published: bool,
    pub likes: BTreeSet<i64>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn like_count(&self) -> i64 {
        self.likes.len() as i64
    }

    pub fn comment_count(&self) -> i64 {
        self.comments.len() as i64
    }

    pub fn has_comment(&self, id: Uuid) -> bool {
        self.comments.iter().any(|comment| comment.id == id)
    }
}

#[derive(Debug, FromRow)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub author_id: i64,
    pub categories: Json<Vec<String>>,
    pub tags: Json<Vec<String>>,
    pub views: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostRow {
    pub fn into_post(self, likes: BTreeSet<i64>, comments: Vec<Comment>) -> Post {
        Post {
            id: self.id,
            title: self.title,
            content: self.content,
            cover_image: self.cover_image,
            author_id: self.author_id,
            categories: self.categories.0,
            tags: self.tags.0,
            views: self.views,
            published: self.published,
            likes,
            comments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub author_id: i64,
    pub author: UserSummary,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub views: i64,
    pub published: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostResponse {
    pub fn new(post: Post, author: UserSummary, viewer_id: Option<i64>) -> Self {
        let liked = viewer_id.map(|viewer| post.likes.contains(&viewer));
        let like_count = post.like_count();
        let comment_count = post.comment_count();
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            cover_image: post.cover_image,
            author_id: post.author_id,
            author,
            categories: post.categories,
            tags: post.tags,
            views: post.views,
            published: post.published,
            like_count,
            comment_count,
            liked,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Listing row: the post columns plus its author, without likes or comments.
#[derive(Debug, FromRow)]
pub struct PostSummaryRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub author_id: i64,
    pub categories: Json<Vec<String>>,
    pub tags: Json<Vec<String>>,
    pub views: i64,
    pub published: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub author_username: String,
    pub author_display_name: Option<String>,
    pub author_avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub author_id: i64,
    pub author: UserSummary,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub views: i64,
    pub published: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<PostSummaryRow> for PostSummary {
    fn from(row: PostSummaryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            cover_image: row.cover_image,
            author_id: row.author_id,
            author: UserSummary {
                id: row.author_id,
                username: row.author_username,
                display_name: row.author_display_name,
                avatar_url: row.author_avatar_url,
            },
            categories: row.categories.0,
            tags: row.tags.0,
            views: row.views,
            published: row.published,
            like_count: row.like_count,
            comment_count: row.comment_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummary>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PostQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

impl PostQuery {
    pub const MAX_PER_PAGE: i64 = 50;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(10).clamp(1, Self::MAX_PER_PAGE)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
    pub message: String,
}
