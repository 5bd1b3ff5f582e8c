use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post, put},
};
use bcrypt::{hash, verify};
use serde::Serialize;

use crate::app::AppState;
use crate::db::{self, PostFilter, PostScope};
use crate::error::{AppError, AppResult};
use crate::models::{
    ChangePassword, PostQuery, ProfileResponse, SettingsResponse, UpdateNotificationSettings,
    UpdatePrivacySettings, UpdateProfile, User, UserResponse,
};
use crate::relations::{FollowOutcome, FollowStatus, detach_user, follow_user, unfollow_user};
use crate::routes::auth::{extract_current_user, extract_optional_user};
use crate::routes::posts::page_of;

#[derive(Debug, Serialize)]
struct FollowResponse {
    status: FollowStatus,
    message: &'static str,
    followers_count: i64,
    following_count: i64,
}

impl From<FollowOutcome> for FollowResponse {
    fn from(outcome: FollowOutcome) -> Self {
        Self {
            status: outcome.status,
            message: outcome.status.message(),
            followers_count: outcome.followers_count,
            following_count: outcome.following_count,
        }
    }
}

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_profile).delete(delete_me))
        .route("/me/password", put(change_password))
        .route("/me/settings", get(get_settings))
        .route("/me/settings/notifications", put(update_notification_settings))
        .route("/me/settings/privacy", put(update_privacy_settings))
        .route("/by-username/{username}", get(get_user_by_username))
        .route("/{user_id}", get(get_user))
        .route("/{user_id}/posts", get(get_user_posts))
        .route("/{user_id}/followers", get(get_followers))
        .route("/{user_id}/following", get(get_following))
        .route("/{user_id}/follow", post(follow))
        .route("/{user_id}/unfollow", post(unfollow))
}

async fn load_existing(state: &AppState, user_id: i64) -> AppResult<User> {
    let mut conn = state.pool.acquire().await?;
    db::load_user(&mut conn, user_id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    Ok(Json(UserResponse::from(current_user)))
}

async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let viewer = extract_optional_user(&state, &headers).await?;
    let user = load_existing(&state, user_id).await?;
    Ok(Json(ProfileResponse::new(user, viewer.map(|v| v.id))))
}

async fn get_user_by_username(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> AppResult<impl IntoResponse> {
    let viewer = extract_optional_user(&state, &headers).await?;
    let mut conn = state.pool.acquire().await?;
    let user = db::load_user_by_username(&mut conn, &username)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(Json(ProfileResponse::new(user, viewer.map(|v| v.id))))
}

async fn get_user_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Query(query): Query<PostQuery>,
) -> AppResult<impl IntoResponse> {
    let viewer = extract_optional_user(&state, &headers).await?;
    load_existing(&state, user_id).await?;

    let filter = PostFilter::new(PostScope::Author {
        author_id: user_id,
        include_drafts: viewer.is_some_and(|v| v.id == user_id),
    });
    page_of(&state, &filter, &query).await.map(Json)
}

async fn get_followers(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let user = load_existing(&state, user_id).await?;
    let ids: Vec<i64> = user.followers.into_iter().collect();
    let mut conn = state.pool.acquire().await?;
    Ok(Json(db::user_summaries(&mut conn, &ids).await?))
}

async fn get_following(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let user = load_existing(&state, user_id).await?;
    let ids: Vec<i64> = user.following.into_iter().collect();
    let mut conn = state.pool.acquire().await?;
    Ok(Json(db::user_summaries(&mut conn, &ids).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<UpdateProfile>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;

    let mut tx = state.pool.begin().await?;
    let mut user = db::load_user(&mut tx, current_user.id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    if let Some(display_name) = input.display_name {
        let trimmed = display_name.trim();
        if !trimmed.is_empty() {
            user.display_name = Some(trimmed.to_string());
        }
    }
    if let Some(bio) = input.bio {
        let trimmed = bio.trim();
        user.bio = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
    }
    if let Some(avatar_url) = input.avatar_url {
        let trimmed = avatar_url.trim();
        user.avatar_url = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
    }
    user.updated_at = Some(chrono::Utc::now());

    db::save_user(&mut tx, &user).await?;
    tx.commit().await?;

    Ok(Json(UserResponse::from(user)))
}

async fn delete_me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    detach_user(&state, current_user.id).await?;
    Ok(Json(serde_json::json!({"message": "Account deleted successfully"})))
}

async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    Ok(Json(SettingsResponse::from(&current_user)))
}

async fn update_notification_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<UpdateNotificationSettings>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;

    let mut tx = state.pool.begin().await?;
    let mut user = db::load_user(&mut tx, current_user.id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let settings = &mut user.settings;
    if let Some(enabled) = input.like_notifications {
        settings.like_notifications = enabled;
    }
    if let Some(enabled) = input.comment_notifications {
        settings.comment_notifications = enabled;
    }
    if let Some(enabled) = input.follower_notifications {
        settings.follower_notifications = enabled;
    }
    user.updated_at = Some(chrono::Utc::now());

    db::save_user(&mut tx, &user).await?;
    tx.commit().await?;

    Ok(Json(user.settings))
}

async fn update_privacy_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<UpdatePrivacySettings>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;

    let mut tx = state.pool.begin().await?;
    let mut user = db::load_user(&mut tx, current_user.id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    if let Some(visibility) = input.profile_visibility {
        user.privacy.profile_visibility = visibility;
    }
    if let Some(show_email) = input.show_email {
        user.privacy.show_email = show_email;
    }
    user.updated_at = Some(chrono::Utc::now());

    db::save_user(&mut tx, &user).await?;
    tx.commit().await?;

    Ok(Json(user.privacy))
}

async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ChangePassword>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    if input.new_password.is_empty() {
        return Err(AppError::BadRequest("New password is required".to_string()));
    }

    let valid = verify(&input.current_password, &current_user.hashed_password)
        .map_err(|e| AppError::Internal(e.into()))?;
    if !valid {
        return Err(AppError::Unauthorized("Current password is incorrect"));
    }
    let hashed = hash(&input.new_password, state.config.bcrypt_cost)
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut tx = state.pool.begin().await?;
    let mut user = db::load_user(&mut tx, current_user.id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    user.hashed_password = hashed;
    user.updated_at = Some(chrono::Utc::now());
    db::save_user(&mut tx, &user).await?;
    tx.commit().await?;
    tracing::info!(user_id = user.id, "password changed");

    Ok(Json(serde_json::json!({"message": "Password updated successfully"})))
}

async fn follow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    let outcome = follow_user(&state, current_user.id, user_id).await?;
    Ok(Json(FollowResponse::from(outcome)))
}

async fn unfollow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&state, &headers).await?;
    let outcome = unfollow_user(&state, current_user.id, user_id).await?;
    Ok(Json(FollowResponse::from(outcome)))
}
