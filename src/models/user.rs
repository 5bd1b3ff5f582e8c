use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user opt-outs for the notifications sent by the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub like_notifications: bool,
    pub comment_notifications: bool,
    pub follower_notifications: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            like_notifications: true,
            comment_notifications: true,
            follower_notifications: true,
        }
    }
}

/// Who may see the full profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProfileVisibility {
    #[default]
    Public,
    Private,
    /// Users who follow and are followed back.
    Friends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub profile_visibility: ProfileVisibility,
    pub show_email: bool,
}

/// User aggregate: profile, settings and both sides of the follow graph.
///
/// `followers_count` and `following_count` cache the sizes of `followers` and
/// `following`. They are only ever rewritten through [`User::recount`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub settings: NotificationSettings,
    pub privacy: PrivacySettings,
    pub followers: BTreeSet<i64>,
    pub following: BTreeSet<i64>,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Name shown to other users.
    pub fn public_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }

    pub fn recount(&mut self) {
        self.followers_count = self.followers.len() as i64;
        self.following_count = self.following.len() as i64;
    }

    /// Whether `viewer_id` gets the full profile rather than the public card.
    pub fn profile_visible_to(&self, viewer_id: Option<i64>) -> bool {
        if viewer_id == Some(self.id) {
            return true;
        }
        match self.privacy.profile_visibility {
            ProfileVisibility::Public => true,
            ProfileVisibility::Private => false,
            ProfileVisibility::Friends => viewer_id.is_some_and(|viewer| {
                self.followers.contains(&viewer) && self.following.contains(&viewer)
            }),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub like_notifications: bool,
    pub comment_notifications: bool,
    pub follower_notifications: bool,
    pub profile_visibility: ProfileVisibility,
    pub show_email: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserRow {
    pub fn into_user(self, followers: BTreeSet<i64>, following: BTreeSet<i64>) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            hashed_password: self.hashed_password,
            display_name: self.display_name,
            bio: self.bio,
            avatar_url: self.avatar_url,
            role: self.role,
            settings: NotificationSettings {
                like_notifications: self.like_notifications,
                comment_notifications: self.comment_notifications,
                follower_notifications: self.follower_notifications,
            },
            privacy: PrivacySettings {
                profile_visibility: self.profile_visibility,
                show_email: self.show_email,
            },
            followers,
            following,
            followers_count: self.followers_count,
            following_count: self.following_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The signed-in user's own view of their account.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            role: user.role,
            followers_count: user.followers_count,
            following_count: user.following_count,
            created_at: user.created_at,
        }
    }
}

/// Profile as seen by `viewer_id`. Viewers the owner's privacy settings shut
/// out get the card only: no bio, no email, `restricted` set.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub is_following: Option<bool>,
    pub restricted: bool,
    pub created_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn new(user: User, viewer_id: Option<i64>) -> Self {
        let is_following = viewer_id.map(|viewer| user.followers.contains(&viewer));
        let visible = user.profile_visible_to(viewer_id);
        let own = viewer_id == Some(user.id);
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bio: user.bio.filter(|_| visible),
            email: Some(user.email).filter(|_| own || (visible && user.privacy.show_email)),
            followers_count: user.followers_count,
            following_count: user.following_count,
            is_following,
            restricted: !visible,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub notifications: NotificationSettings,
    pub privacy: PrivacySettings,
}

impl From<&User> for SettingsResponse {
    fn from(user: &User) -> Self {
        Self {
            notifications: user.settings,
            privacy: user.privacy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrivacySettings {
    pub profile_visibility: Option<ProfileVisibility>,
    pub show_email: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotificationSettings {
    pub like_notifications: Option<bool>,
    pub comment_notifications: Option<bool>,
    pub follower_notifications: Option<bool>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn user(id: i64, visibility: ProfileVisibility) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            hashed_password: String::new(),
            display_name: None,
            bio: Some("about me".to_string()),
            avatar_url: None,
            role: "user".to_string(),
            settings: NotificationSettings::default(),
            privacy: PrivacySettings {
                profile_visibility: visibility,
                show_email: true,
            },
            followers: BTreeSet::new(),
            following: BTreeSet::new(),
            followers_count: 0,
            following_count: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn friends_only_profiles_need_a_mutual_follow() {
        let mut owner = user(1, ProfileVisibility::Friends);
        owner.followers.insert(2);
        assert!(!owner.profile_visible_to(Some(2)));
        assert!(!owner.profile_visible_to(None));

        owner.following.insert(2);
        assert!(owner.profile_visible_to(Some(2)));
        assert!(owner.profile_visible_to(Some(1)));
    }

    #[test]
    fn private_profiles_show_the_card_only() {
        let owner = user(1, ProfileVisibility::Private);

        let outsider = ProfileResponse::new(owner.clone(), Some(2));
        assert!(outsider.restricted);
        assert_eq!(outsider.bio, None);
        assert_eq!(outsider.email, None);
        assert_eq!(outsider.username, "user1");

        let own = ProfileResponse::new(owner, Some(1));
        assert!(!own.restricted);
        assert_eq!(own.bio.as_deref(), Some("about me"));
        assert_eq!(own.email.as_deref(), Some("user1@example.com"));
    }

    #[test]
    fn email_is_shown_only_when_opted_in() {
        let mut owner = user(1, ProfileVisibility::Public);
        assert_eq!(
            ProfileResponse::new(owner.clone(), None).email.as_deref(),
            Some("user1@example.com")
        );

        owner.privacy.show_email = false;
        let profile = ProfileResponse::new(owner, None);
        assert_eq!(profile.email, None);
        assert_eq!(profile.bio.as_deref(), Some("about me"));
    }
}
