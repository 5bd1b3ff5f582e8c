use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};

use crate::app::AppState;
use crate::comment_tree::{add_comment, comment_thread};
use crate::error::AppResult;
use crate::models::{CommentResponse, CreateComment, UserSummary};
use crate::routes::auth::{extract_current_user, extract_optional_user};

pub fn comments_routes() -> Router<AppState> {
    Router::new().route(
        "/{post_id}/comments",
        get(list_comments).post(create_comment),
    )
}

async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let viewer = extract_optional_user(&state, &headers).await?;
    let thread = comment_thread(&state, post_id, viewer.map(|user| user.id)).await?;
    Ok(Json(thread))
}

async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(input): Json<CreateComment>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    let comment = add_comment(&state, post_id, &current_user, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            comment,
            author: UserSummary::from(&current_user),
        }),
    ))
}
