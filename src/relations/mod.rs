//! Like and follow relationships.
//!
//! The toggles here work on aggregates that are already in memory; the
//! services below wrap them in load -> mutate -> save transactions and request
//! notifications once the change is committed.

use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{Post, User};
use crate::notify::{notify_follow, notify_like};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    Followed,
    AlreadyFollowing,
    Unfollowed,
}

impl FollowStatus {
    pub fn message(self) -> &'static str {
        match self {
            FollowStatus::Followed => "Followed successfully",
            FollowStatus::AlreadyFollowing => "Already following",
            FollowStatus::Unfollowed => "Unfollowed successfully",
        }
    }
}

/// `followers_count` is the target's, `following_count` the actor's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowOutcome {
    pub status: FollowStatus,
    pub followers_count: i64,
    pub following_count: i64,
}

/// Flips `actor_id`'s membership in the post's like set.
pub fn toggle_like(post: &mut Post, actor_id: i64) -> LikeOutcome {
    let liked = if post.likes.remove(&actor_id) {
        false
    } else {
        post.likes.insert(actor_id);
        true
    };
    LikeOutcome {
        liked,
        like_count: post.like_count(),
    }
}

pub fn follow(actor: &mut User, target: &mut User) -> AppResult<FollowOutcome> {
    if actor.id == target.id {
        return Err(AppError::InvalidOperation("You cannot follow yourself"));
    }

    let already_following = actor.following.contains(&target.id);
    actor.following.insert(target.id);
    target.followers.insert(actor.id);
    actor.recount();
    target.recount();

    Ok(FollowOutcome {
        status: if already_following {
            FollowStatus::AlreadyFollowing
        } else {
            FollowStatus::Followed
        },
        followers_count: target.followers_count,
        following_count: actor.following_count,
    })
}

/// Removing an edge that does not exist is a no-op.
pub fn unfollow(actor: &mut User, target: &mut User) -> AppResult<FollowOutcome> {
    if actor.id == target.id {
        return Err(AppError::InvalidOperation("You cannot unfollow yourself"));
    }

    actor.following.remove(&target.id);
    target.followers.remove(&actor.id);
    actor.recount();
    target.recount();

    Ok(FollowOutcome {
        status: FollowStatus::Unfollowed,
        followers_count: target.followers_count,
        following_count: actor.following_count,
    })
}

pub async fn like_post(state: &AppState, post_id: i64, actor: &User) -> AppResult<LikeOutcome> {
    let mut tx = state.pool.begin().await?;

    let mut post = db::load_post(&mut tx, post_id)
        .await?
        .filter(|post| post.published || post.author_id == actor.id)
        .ok_or(AppError::NotFound("Post"))?;

    let outcome = toggle_like(&mut post, actor.id);
    db::save_post(&mut tx, &post).await?;

    let author = if outcome.liked && post.author_id != actor.id {
        db::load_user(&mut tx, post.author_id).await?
    } else {
        None
    };

    tx.commit().await?;
    tracing::debug!(post_id, user_id = actor.id, liked = outcome.liked, "like toggled");

    if let Some(author) = author {
        notify_like(state.notifier.as_ref(), &author, actor.public_name(), &post.title);
    }

    Ok(outcome)
}

pub async fn follow_user(state: &AppState, actor_id: i64, target_id: i64) -> AppResult<FollowOutcome> {
    if actor_id == target_id {
        return Err(AppError::InvalidOperation("You cannot follow yourself"));
    }

    let mut tx = state.pool.begin().await?;
    let (mut actor, mut target) = load_pair(&mut tx, actor_id, target_id).await?;

    let outcome = follow(&mut actor, &mut target)?;
    if outcome.status == FollowStatus::AlreadyFollowing {
        return Ok(outcome);
    }

    db::save_user(&mut tx, &actor).await?;
    db::save_user(&mut tx, &target).await?;
    tx.commit().await?;
    tracing::debug!(actor_id, target_id, "followed");

    notify_follow(state.notifier.as_ref(), &target, actor.public_name());

    Ok(outcome)
}

pub async fn unfollow_user(
    state: &AppState,
    actor_id: i64,
    target_id: i64,
) -> AppResult<FollowOutcome> {
    if actor_id == target_id {
        return Err(AppError::InvalidOperation("You cannot unfollow yourself"));
    }

    let mut tx = state.pool.begin().await?;
    let (mut actor, mut target) = load_pair(&mut tx, actor_id, target_id).await?;

    let outcome = unfollow(&mut actor, &mut target)?;
    db::save_user(&mut tx, &actor).await?;
    db::save_user(&mut tx, &target).await?;
    tx.commit().await?;
    tracing::debug!(actor_id, target_id, "unfollowed");

    Ok(outcome)
}

/// Deletes an account after detaching it from the follow graph, so every
/// remaining user's counters still match their sets.
pub async fn detach_user(state: &AppState, user_id: i64) -> AppResult<()> {
    let mut tx = state.pool.begin().await?;
    let mut user = db::load_user(&mut tx, user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    for followee_id in user.following.clone() {
        if let Some(mut followee) = db::load_user(&mut tx, followee_id).await? {
            unfollow(&mut user, &mut followee)?;
            db::save_user(&mut tx, &followee).await?;
        }
    }
    for follower_id in user.followers.clone() {
        if let Some(mut follower) = db::load_user(&mut tx, follower_id).await? {
            unfollow(&mut follower, &mut user)?;
            db::save_user(&mut tx, &follower).await?;
        }
    }

    db::delete_user(&mut tx, user.id).await?;
    tx.commit().await?;
    tracing::info!(user_id, "account deleted");

    Ok(())
}

async fn load_pair(
    conn: &mut sqlx::SqliteConnection,
    actor_id: i64,
    target_id: i64,
) -> AppResult<(User, User)> {
    let actor = db::load_user(&mut *conn, actor_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let target = db::load_user(&mut *conn, target_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok((actor, target))
}
