//! Best-effort notifications for likes, comments and new followers.
//!
//! Delivery never fails the request that triggered it: errors are logged and
//! dropped by the `notify_*` helpers.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::models::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for Recipient {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Like {
        to: Recipient,
        liker_name: String,
        post_title: String,
    },
    Comment {
        to: Recipient,
        commenter_name: String,
        post_title: String,
        comment_body: String,
    },
    Follow {
        to: Recipient,
        follower_name: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &Recipient {
        match self {
            Notification::Like { to, .. }
            | Notification::Comment { to, .. }
            | Notification::Follow { to, .. } => to,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::Like { liker_name, .. } => format!("{liker_name} liked your post!"),
            Notification::Comment { commenter_name, .. } => {
                format!("{commenter_name} commented on your post")
            }
            Notification::Follow { follower_name, .. } => {
                format!("{follower_name} started following you!")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

pub trait Notifier: Send + Sync {
    /// Hands the notification off. Must not block on delivery.
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        let to = notification.recipient();
        tracing::info!(
            to = %to.email,
            subject = %notification.subject(),
            "notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a relay (for example a mail service).
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Each delivery is abandoned after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| anyhow::anyhow!("Failed to build notification HTTP client: {error}"))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: String,
    #[serde(flatten)]
    notification: &'a Notification,
}

impl Notifier for WebhookNotifier {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;

        let notifier = self.clone();
        runtime.spawn(async move {
            match notifier.relay(&notification).await {
                Ok(()) => tracing::debug!(to = %notification.recipient().email, "notification relayed"),
                Err(err) => tracing::warn!(?err, "notification webhook failed"),
            }
        });
        Ok(())
    }
}

impl WebhookNotifier {
    async fn relay(&self, notification: &Notification) -> Result<(), reqwest::Error> {
        let payload = WebhookPayload {
            subject: notification.subject(),
            notification,
        };
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn dispatch(notifier: &dyn Notifier, notification: Notification) {
    if let Err(err) = notifier.deliver(notification) {
        tracing::warn!(%err, "dropping notification");
    }
}

pub fn notify_like(notifier: &dyn Notifier, post_author: &User, liker_name: &str, post_title: &str) {
    if !post_author.settings.like_notifications {
        return;
    }
    dispatch(
        notifier,
        Notification::Like {
            to: post_author.into(),
            liker_name: liker_name.to_string(),
            post_title: post_title.to_string(),
        },
    );
}

pub fn notify_comment(
    notifier: &dyn Notifier,
    post_author: &User,
    commenter_name: &str,
    post_title: &str,
    comment_body: &str,
) {
    if !post_author.settings.comment_notifications {
        return;
    }
    dispatch(
        notifier,
        Notification::Comment {
            to: post_author.into(),
            commenter_name: commenter_name.to_string(),
            post_title: post_title.to_string(),
            comment_body: comment_body.to_string(),
        },
    );
}

pub fn notify_follow(notifier: &dyn Notifier, target_user: &User, follower_name: &str) {
    if !target_user.settings.follower_notifications {
        return;
    }
    dispatch(
        notifier,
        Notification::Follow {
            to: target_user.into(),
            follower_name: follower_name.to_string(),
        },
    );
}
