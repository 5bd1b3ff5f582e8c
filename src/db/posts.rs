use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, types::Json};

use crate::models::{Comment, CreatePost, Post, PostRow, PostSummary, PostSummaryRow};

const POST_COLUMNS: &str = "id, title, content, cover_image, author_id, categories, tags, views, published, created_at, updated_at";

/// Which posts a listing covers.
#[derive(Debug, Clone)]
pub enum PostScope {
    Published,
    Author { author_id: i64, include_drafts: bool },
    /// Published posts of any of these authors.
    Authors(Vec<i64>),
}

#[derive(Debug, Clone)]
pub struct PostFilter {
    pub scope: PostScope,
    pub category: Option<String>,
    pub tag: Option<String>,
}

impl PostFilter {
    pub fn new(scope: PostScope) -> Self {
        Self {
            scope,
            category: None,
            tag: None,
        }
    }
}

/// Loads the whole post aggregate: row, like set and comments in stored order.
pub async fn load_post(conn: &mut SqliteConnection, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
    let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?");
    let Some(row) = sqlx::query_as::<_, PostRow>(&query)
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let likes: BTreeSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT user_id FROM post_likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, author_id, body, reaction, parent_id, created_at
        FROM comments
        WHERE post_id = ?
        ORDER BY position ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_post(likes, comments)))
}

/// Writes the whole aggregate back; like set and comment list are replaced.
pub async fn save_post(conn: &mut SqliteConnection, post: &Post) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, content = ?, cover_image = ?, categories = ?, tags = ?, views = ?,
            published = ?, like_count = ?, comment_count = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.cover_image)
    .bind(Json(&post.categories))
    .bind(Json(&post.tags))
    .bind(post.views)
    .bind(post.published)
    .bind(post.like_count())
    .bind(post.comment_count())
    .bind(post.updated_at)
    .bind(post.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }

    sqlx::query("DELETE FROM post_likes WHERE post_id = ?")
        .bind(post.id)
        .execute(&mut *conn)
        .await?;
    for user_id in &post.likes {
        sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES (?, ?)")
            .bind(post.id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(post.id)
        .execute(&mut *conn)
        .await?;
    for (position, comment) in post.comments.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, position, author_id, body, reaction, parent_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(comment.id)
        .bind(post.id)
        .bind(position as i64)
        .bind(comment.author_id)
        .bind(&comment.body)
        .bind(&comment.reaction)
        .bind(comment.parent_id)
        .bind(comment.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn insert_post(
    conn: &mut SqliteConnection,
    author_id: i64,
    input: &CreatePost,
    now: DateTime<Utc>,
) -> Result<Post, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, content, cover_image, author_id, categories, tags, published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.title.trim())
    .bind(&input.content)
    .bind(&input.cover_image)
    .bind(author_id)
    .bind(Json(&input.categories))
    .bind(Json(&input.tags))
    .bind(input.published.unwrap_or(true))
    .bind(now)
    .execute(&mut *conn)
    .await?;

    load_post(conn, result.last_insert_rowid())
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Likes and comments go with the post.
pub async fn delete_post(conn: &mut SqliteConnection, post_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn increment_views(conn: &mut SqliteConnection, post_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE posts SET views = views + 1 WHERE id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Newest first. Returns the requested page and the total number of matches.
pub async fn list_posts(
    conn: &mut SqliteConnection,
    filter: &PostFilter,
    page: i64,
    per_page: i64,
) -> Result<(Vec<PostSummary>, i64), sqlx::Error> {
    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts p");
    push_conditions(&mut count_query, filter);
    let total = count_query
        .build_query_scalar::<i64>()
        .fetch_one(&mut *conn)
        .await?;

    let mut page_query = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT
            p.id, p.title, p.content, p.cover_image, p.author_id, p.categories, p.tags,
            p.views, p.published, p.like_count, p.comment_count, p.created_at, p.updated_at,
            u.username AS author_username,
            u.display_name AS author_display_name,
            u.avatar_url AS author_avatar_url
        FROM posts p
        JOIN users u ON u.id = p.author_id
        "#,
    );
    push_conditions(&mut page_query, filter);
    page_query
        .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind((page.max(1) - 1).saturating_mul(per_page));

    let posts = page_query
        .build_query_as::<PostSummaryRow>()
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(PostSummary::from)
        .collect();

    Ok((posts, total))
}

fn push_conditions(builder: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    builder.push(" WHERE 1 = 1");

    match &filter.scope {
        PostScope::Published => {
            builder.push(" AND p.published = 1");
        }
        PostScope::Author {
            author_id,
            include_drafts,
        } => {
            builder.push(" AND p.author_id = ").push_bind(*author_id);
            if !include_drafts {
                builder.push(" AND p.published = 1");
            }
        }
        PostScope::Authors(author_ids) => {
            builder.push(" AND p.published = 1 AND p.author_id IN (");
            let mut ids = builder.separated(", ");
            for author_id in author_ids {
                ids.push_bind(*author_id);
            }
            builder.push(")");
        }
    }

    if let Some(category) = &filter.category {
        builder
            .push(" AND EXISTS (SELECT 1 FROM json_each(p.categories) WHERE json_each.value = ")
            .push_bind(category.clone())
            .push(")");
    }
    if let Some(tag) = &filter.tag {
        builder
            .push(" AND EXISTS (SELECT 1 FROM json_each(p.tags) WHERE json_each.value = ")
            .push_bind(tag.clone())
            .push(")");
    }
}
