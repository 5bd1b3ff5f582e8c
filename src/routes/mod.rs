pub mod auth;
pub mod comments;
pub mod posts;
pub mod users;

pub use auth::auth_routes;
pub use comments::comments_routes;
pub use posts::posts_routes;
pub use users::users_routes;

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::app::{build_router, testing};

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Registers `username` and returns (user id, bearer token).
    async fn sign_up(app: &Router, username: &str) -> (i64, String) {
        let (status, user) = call(
            app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "hunter22",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, token) = call(
            app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": format!("{username}@example.com"), "password": "hunter22"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        (
            user["id"].as_i64().unwrap(),
            token["access_token"].as_str().unwrap().to_string(),
        )
    }

    async fn app() -> Router {
        let (state, _) = testing::state().await;
        build_router(state)
    }

    #[tokio::test]
    async fn registration_login_and_me() {
        let app = app().await;
        let (id, token) = sign_up(&app, "alice").await;

        let (status, me) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], id);
        assert_eq!(me["display_name"], "alice");

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "alice", "email": "x@example.com", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["detail"].is_string());

        let (status, _) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "alice@example.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, "GET", "/api/auth/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn like_toggle_over_http() {
        let app = app().await;
        let (_, alice) = sign_up(&app, "alice").await;
        let (_, bob) = sign_up(&app, "bob").await;

        let (status, post) = call(
            &app,
            "POST",
            "/api/posts",
            Some(&alice),
            Some(json!({"title": "Hello", "content": "World", "tags": ["intro"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let like_uri = format!("/api/posts/{}/like", post["id"]);

        let (status, liked) = call(&app, "POST", &like_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(liked["liked"], true);
        assert_eq!(liked["like_count"], 1);

        let (_, unliked) = call(&app, "POST", &like_uri, Some(&bob), None).await;
        assert_eq!(unliked["liked"], false);
        assert_eq!(unliked["like_count"], 0);

        let (status, _) = call(&app, "POST", "/api/posts/9999/like", Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "POST", &like_uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, detail) = call(
            &app,
            "GET",
            &format!("/api/posts/{}", post["id"]),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(detail["liked"], false);
        assert_eq!(detail["views"], 1);
    }

    #[tokio::test]
    async fn nested_comments_over_http() {
        let app = app().await;
        let (_, alice) = sign_up(&app, "alice").await;

        let (_, post) = call(
            &app,
            "POST",
            "/api/posts",
            Some(&alice),
            Some(json!({"title": "Threads", "content": "Reply below"})),
        )
        .await;
        let uri = format!("/api/posts/{}/comments", post["id"]);

        let (status, root) = call(&app, "POST", &uri, Some(&alice), Some(json!({"body": "root"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(root["author"]["username"], "alice");

        let (status, _) = call(
            &app,
            "POST",
            &uri,
            Some(&alice),
            Some(json!({"comment": "child", "parent_id": root["id"], "reaction": "❤️"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, thread) = call(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(thread["total"], 2);
        assert_eq!(thread["comments"].as_array().unwrap().len(), 1);
        assert_eq!(thread["comments"][0]["body"], "root");
        assert_eq!(thread["comments"][0]["children"][0]["body"], "child");
        assert_eq!(thread["comments"][0]["children"][0]["reaction"], "❤️");

        let (status, _) = call(&app, "POST", &uri, Some(&alice), Some(json!({"body": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn follow_unfollow_and_feed_over_http() {
        let app = app().await;
        let (alice_id, alice) = sign_up(&app, "alice").await;
        let (bob_id, bob) = sign_up(&app, "bob").await;

        call(
            &app,
            "POST",
            "/api/posts",
            Some(&bob),
            Some(json!({"title": "Bob writes", "content": "Something"})),
        )
        .await;

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/users/{alice_id}/follow"),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());

        let follow_uri = format!("/api/users/{bob_id}/follow");
        let (_, first) = call(&app, "POST", &follow_uri, Some(&alice), None).await;
        assert_eq!(first["status"], "followed");
        assert_eq!(first["followers_count"], 1);

        let (status, again) = call(&app, "POST", &follow_uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["status"], "already_following");
        assert_eq!(again["followers_count"], 1);

        let (_, profile) = call(&app, "GET", &format!("/api/users/{bob_id}"), Some(&alice), None).await;
        assert_eq!(profile["followers_count"], 1);
        assert_eq!(profile["is_following"], true);

        let (_, followers) =
            call(&app, "GET", &format!("/api/users/{bob_id}/followers"), None, None).await;
        assert_eq!(followers[0]["username"], "alice");

        let (_, feed) = call(&app, "GET", "/api/posts/feed", Some(&alice), None).await;
        assert_eq!(feed["total"], 1);
        assert_eq!(feed["posts"][0]["title"], "Bob writes");

        let (_, gone) = call(
            &app,
            "POST",
            &format!("/api/users/{bob_id}/unfollow"),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(gone["status"], "unfollowed");
        assert_eq!(gone["followers_count"], 0);
        assert_eq!(gone["following_count"], 0);

        let (_, feed) = call(&app, "GET", "/api/posts/feed", Some(&alice), None).await;
        assert_eq!(feed["total"], 0);
    }

    #[tokio::test]
    async fn drafts_stay_private_and_settings_update() {
        let app = app().await;
        let (_, alice) = sign_up(&app, "alice").await;
        let (_, bob) = sign_up(&app, "bob").await;

        let (_, draft) = call(
            &app,
            "POST",
            "/api/posts",
            Some(&alice),
            Some(json!({"title": "Draft", "content": "Soon", "published": false})),
        )
        .await;
        let uri = format!("/api/posts/{}", draft["id"]);

        let (status, _) = call(&app, "GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "GET", &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "PUT", &uri, Some(&bob), Some(json!({"title": "Mine"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "DELETE", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, public_post) = call(
            &app,
            "POST",
            "/api/posts",
            Some(&alice),
            Some(json!({"title": "Out", "content": "Now"})),
        )
        .await;
        let public_uri = format!("/api/posts/{}", public_post["id"]);
        let (status, _) =
            call(&app, "PUT", &public_uri, Some(&bob), Some(json!({"title": "Mine"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, "DELETE", &public_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, "DELETE", &public_uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, mine) = call(&app, "GET", "/api/posts/mine", Some(&alice), None).await;
        assert_eq!(mine["total"], 1);
        let (_, public) = call(&app, "GET", "/api/posts", None, None).await;
        assert_eq!(public["total"], 0);

        let (status, far) =
            call(&app, "GET", "/api/posts/mine?page=9223372036854775807&per_page=50", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(far["total"], 1);
        assert!(far["posts"].as_array().unwrap().is_empty());

        let (status, settings) = call(
            &app,
            "PUT",
            "/api/users/me/settings/notifications",
            Some(&alice),
            Some(json!({"like_notifications": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settings["like_notifications"], false);
        assert_eq!(settings["follower_notifications"], true);

        let (status, _) = call(&app, "DELETE", "/api/users/me", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", "/api/auth/me", Some(&alice), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn privacy_password_and_username_lookup() {
        let app = app().await;
        let (alice_id, alice) = sign_up(&app, "alice").await;
        let (_, bob) = sign_up(&app, "bob").await;

        let (status, profile) =
            call(&app, "GET", "/api/users/by-username/alice", Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["id"], alice_id);
        assert_eq!(profile["restricted"], false);
        assert!(profile["email"].is_null());
        let (status, _) = call(&app, "GET", "/api/users/by-username/nobody", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, privacy) = call(
            &app,
            "PUT",
            "/api/users/me/settings/privacy",
            Some(&alice),
            Some(json!({"profile_visibility": "private", "show_email": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(privacy["profile_visibility"], "private");
        assert_eq!(privacy["show_email"], true);

        let profile_uri = format!("/api/users/{alice_id}");
        let (_, seen_by_bob) = call(&app, "GET", &profile_uri, Some(&bob), None).await;
        assert_eq!(seen_by_bob["restricted"], true);
        assert!(seen_by_bob["email"].is_null());
        let (_, seen_by_alice) = call(&app, "GET", &profile_uri, Some(&alice), None).await;
        assert_eq!(seen_by_alice["restricted"], false);
        assert_eq!(seen_by_alice["email"], "alice@example.com");

        let (_, settings) = call(&app, "GET", "/api/users/me/settings", Some(&alice), None).await;
        assert_eq!(settings["notifications"]["like_notifications"], true);
        assert_eq!(settings["privacy"]["profile_visibility"], "private");

        let (status, _) = call(
            &app,
            "PUT",
            "/api/users/me/password",
            Some(&alice),
            Some(json!({"current_password": "wrong", "new_password": "n3w-secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            "PUT",
            "/api/users/me/password",
            Some(&alice),
            Some(json!({"current_password": "hunter22", "new_password": "n3w-secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let login = |password: &str| {
            json!({"email": "alice@example.com", "password": password})
        };
        let (status, _) =
            call(&app, "POST", "/api/auth/login", None, Some(login("hunter22"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            call(&app, "POST", "/api/auth/login", None, Some(login("n3w-secret"))).await;
        assert_eq!(status, StatusCode::OK);
    }
}
