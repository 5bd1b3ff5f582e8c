use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::models::{User, UserRow, UserSummary};

const USER_COLUMNS: &str = r#"
    id, username, email, hashed_password, display_name, bio, avatar_url, role,
    like_notifications, comment_notifications, follower_notifications,
    profile_visibility, show_email, followers_count, following_count, created_at, updated_at
"#;

/// Loads the user aggregate including both sides of its follow edges.
pub async fn load_user(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(with_edges(conn, row).await?)),
        None => Ok(None),
    }
}

pub async fn load_user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(with_edges(conn, row).await?)),
        None => Ok(None),
    }
}

pub async fn load_user_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(with_edges(conn, row).await?)),
        None => Ok(None),
    }
}

pub async fn username_or_email_taken(
    conn: &mut SqliteConnection,
    username: &str,
    email: &str,
) -> Result<bool, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

async fn with_edges(conn: &mut SqliteConnection, row: UserRow) -> Result<User, sqlx::Error> {
    let followers: BTreeSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT follower_id FROM user_follows WHERE followee_id = ?")
            .bind(row.id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();
    let following: BTreeSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT followee_id FROM user_follows WHERE follower_id = ?")
            .bind(row.id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();
    Ok(row.into_user(followers, following))
}

/// Writes the whole aggregate back. Follow edges touching this user are
/// rewritten from its `followers` and `following` sets.
pub async fn save_user(conn: &mut SqliteConnection, user: &User) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET email = ?, hashed_password = ?, display_name = ?, bio = ?, avatar_url = ?, role = ?,
            like_notifications = ?, comment_notifications = ?, follower_notifications = ?,
            profile_visibility = ?, show_email = ?, followers_count = ?, following_count = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.hashed_password)
    .bind(&user.display_name)
    .bind(&user.bio)
    .bind(&user.avatar_url)
    .bind(&user.role)
    .bind(user.settings.like_notifications)
    .bind(user.settings.comment_notifications)
    .bind(user.settings.follower_notifications)
    .bind(user.privacy.profile_visibility)
    .bind(user.privacy.show_email)
    .bind(user.followers_count)
    .bind(user.following_count)
    .bind(user.updated_at)
    .bind(user.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }

    sqlx::query("DELETE FROM user_follows WHERE follower_id = ? OR followee_id = ?")
        .bind(user.id)
        .bind(user.id)
        .execute(&mut *conn)
        .await?;

    let edges = user
        .following
        .iter()
        .map(|&followee| (user.id, followee))
        .chain(user.followers.iter().map(|&follower| (follower, user.id)));
    for (follower_id, followee_id) in edges {
        sqlx::query("INSERT OR IGNORE INTO user_follows (follower_id, followee_id) VALUES (?, ?)")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    email: &str,
    hashed_password: &str,
    display_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<User, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO users (username, email, hashed_password, display_name, created_at)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(username)
    .bind(email)
    .bind(hashed_password)
    .bind(display_name)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    load_user(conn, result.last_insert_rowid())
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Removes the user row. Their posts go with it, as do their likes on other
/// posts, whose cached like counts are refreshed. Follow edges must already
/// have been detached so that other users' counters stay right.
pub async fn delete_user(conn: &mut SqliteConnection, user_id: i64) -> Result<(), sqlx::Error> {
    let liked_posts = sqlx::query_scalar::<_, i64>("SELECT post_id FROM post_likes WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    for post_id in liked_posts {
        sqlx::query(
            "UPDATE posts SET like_count = (SELECT COUNT(*) FROM post_likes WHERE post_id = ?) WHERE id = ?",
        )
        .bind(post_id)
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Display info for the given users, ordered by username.
pub async fn user_summaries(
    conn: &mut SqliteConnection,
    user_ids: &[i64],
) -> Result<Vec<UserSummary>, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id, username, display_name, avatar_url FROM users WHERE id IN (",
    );
    let mut ids = query.separated(", ");
    for user_id in user_ids {
        ids.push_bind(*user_id);
    }
    query.push(") ORDER BY username ASC");

    query
        .build_query_as::<UserSummary>()
        .fetch_all(&mut *conn)
        .await
}
