use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use crate::app::AppState;
use crate::db::{self, PostFilter, PostScope};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreatePost, LikeResponse, PostListResponse, PostQuery, PostResponse, UpdatePost, UserSummary,
};
use crate::relations::like_post;
use crate::routes::auth::{extract_current_user, extract_optional_user};

pub fn posts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/mine", get(my_posts))
        .route("/feed", get(feed))
        .route(
            "/{post_id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/{post_id}/like", post(toggle_like))
}

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = PostFilter {
        scope: PostScope::Published,
        category: query.category.clone(),
        tag: query.tag.clone(),
    };
    page_of(&state, &filter, &query).await.map(Json)
}

async fn my_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PostQuery>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    let filter = PostFilter::new(PostScope::Author {
        author_id: current_user.id,
        include_drafts: true,
    });
    page_of(&state, &filter, &query).await.map(Json)
}

/// Published posts by the authors the current user follows.
async fn feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PostQuery>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    if current_user.following.is_empty() {
        return Ok(Json(PostListResponse {
            posts: Vec::new(),
            total: 0,
            page: query.page(),
            per_page: query.per_page(),
        }));
    }

    let filter = PostFilter::new(PostScope::Authors(
        current_user.following.iter().copied().collect(),
    ));
    page_of(&state, &filter, &query).await.map(Json)
}

pub(crate) async fn page_of(
    state: &AppState,
    filter: &PostFilter,
    query: &PostQuery,
) -> AppResult<PostListResponse> {
    let (page, per_page) = (query.page(), query.per_page());
    let mut conn = state.pool.acquire().await?;
    let (posts, total) = db::list_posts(&mut conn, filter, page, per_page).await?;
    Ok(PostListResponse {
        posts,
        total,
        page,
        per_page,
    })
}

async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let viewer = extract_optional_user(&state, &headers).await?;
    let viewer_id = viewer.as_ref().map(|user| user.id);

    let mut conn = state.pool.acquire().await?;
    let mut post = db::load_post(&mut conn, post_id)
        .await?
        .filter(|post| post.published || Some(post.author_id) == viewer_id)
        .ok_or(AppError::NotFound("Post"))?;

    db::increment_views(&mut conn, post_id).await?;
    post.views += 1;

    let author = db::load_user(&mut conn, post.author_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    Ok(Json(PostResponse::new(
        post,
        UserSummary::from(&author),
        viewer_id,
    )))
}

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreatePost>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;

    if input.title.trim().is_empty() || input.content.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Title and content are required".to_string(),
        ));
    }

    let mut conn = state.pool.acquire().await?;
    let post = db::insert_post(&mut conn, current_user.id, &input, Utc::now()).await?;
    tracing::info!(post_id = post.id, author_id = current_user.id, "post created");

    Ok((
        StatusCode::CREATED,
        Json(PostResponse::new(
            post,
            UserSummary::from(&current_user),
            Some(current_user.id),
        )),
    ))
}

async fn update_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(input): Json<UpdatePost>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;

    let mut tx = state.pool.begin().await?;
    let mut post = db::load_post(&mut tx, post_id)
        .await?
        .filter(|post| post.published || post.author_id == current_user.id)
        .ok_or(AppError::NotFound("Post"))?;

    if post.author_id != current_user.id {
        return Err(AppError::Forbidden("Not authorized to update this post"));
    }

    if let Some(title) = input.title.map(|t| t.trim().to_string()) {
        if title.is_empty() {
            return Err(AppError::BadRequest("Title cannot be empty".to_string()));
        }
        post.title = title;
    }
    if let Some(content) = input.content {
        if content.trim().is_empty() {
            return Err(AppError::BadRequest("Content cannot be empty".to_string()));
        }
        post.content = content;
    }
    if let Some(cover_image) = input.cover_image {
        post.cover_image = Some(cover_image).filter(|url| !url.is_empty());
    }
    if let Some(categories) = input.categories {
        post.categories = categories;
    }
    if let Some(tags) = input.tags {
        post.tags = tags;
    }
    if let Some(published) = input.published {
        post.published = published;
    }
    post.updated_at = Some(Utc::now());

    db::save_post(&mut tx, &post).await?;
    tx.commit().await?;

    Ok(Json(PostResponse::new(
        post,
        UserSummary::from(&current_user),
        Some(current_user.id),
    )))
}

async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;

    let mut tx = state.pool.begin().await?;
    let post = db::load_post(&mut tx, post_id)
        .await?
        .filter(|post| post.published || post.author_id == current_user.id)
        .ok_or(AppError::NotFound("Post"))?;

    if post.author_id != current_user.id {
        return Err(AppError::Forbidden("Not authorized to delete this post"));
    }

    db::delete_post(&mut tx, post_id).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({"message": "Post deleted successfully"})))
}

async fn toggle_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    let outcome = like_post(&state, post_id, &current_user).await?;

    Ok(Json(LikeResponse {
        liked: outcome.liked,
        like_count: outcome.like_count,
        message: if outcome.liked { "Post liked" } else { "Post unliked" }.to_string(),
    }))
}
