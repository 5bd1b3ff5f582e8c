use std::collections::BTreeSet;

use chrono::Utc;
use uuid::Uuid;

use super::{build_comment_tree, forest_len};
use crate::app::AppState;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{Comment, CommentThread, CreateComment, User};
use crate::notify::notify_comment;

/// Appends a comment to a post and saves the post.
pub async fn add_comment(
    state: &AppState,
    post_id: i64,
    author: &User,
    input: CreateComment,
) -> AppResult<Comment> {
    let body = input.body.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Comment body is required".to_string()));
    }
    let reaction = input
        .reaction
        .map(|reaction| reaction.trim().to_string())
        .filter(|reaction| !reaction.is_empty());

    let mut tx = state.pool.begin().await?;
    let mut post = db::load_post(&mut tx, post_id)
        .await?
        .filter(|post| post.published || post.author_id == author.id)
        .ok_or(AppError::NotFound("Post"))?;

    if let Some(parent_id) = input.parent_id {
        if !post.has_comment(parent_id) {
            return Err(AppError::NotFound("Parent comment"));
        }
    }

    let comment = Comment {
        id: Uuid::new_v4(),
        author_id: author.id,
        body: body.to_string(),
        reaction,
        parent_id: input.parent_id,
        created_at: Utc::now(),
    };
    post.comments.push(comment.clone());
    db::save_post(&mut tx, &post).await?;

    let post_author = if post.author_id != author.id {
        db::load_user(&mut tx, post.author_id).await?
    } else {
        None
    };
    tx.commit().await?;
    tracing::debug!(post_id, comment = %comment.id, "comment added");

    if let Some(post_author) = post_author {
        notify_comment(
            state.notifier.as_ref(),
            &post_author,
            author.public_name(),
            &post.title,
            &comment.body,
        );
    }

    Ok(comment)
}

/// The post's comments as reply threads, with the commenters' display info.
pub async fn comment_thread(
    state: &AppState,
    post_id: i64,
    viewer_id: Option<i64>,
) -> AppResult<CommentThread> {
    let mut conn = state.pool.acquire().await?;
    let post = db::load_post(&mut conn, post_id)
        .await?
        .filter(|post| post.published || Some(post.author_id) == viewer_id)
        .ok_or(AppError::NotFound("Post"))?;

    let author_ids: Vec<i64> = post
        .comments
        .iter()
        .map(|comment| comment.author_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let authors = db::user_summaries(&mut conn, &author_ids).await?;

    let comments = build_comment_tree(post.comments);
    Ok(CommentThread {
        total: forest_len(&comments),
        comments,
        authors,
    })
}
