//! User notifications (password expiry notices, lost-password links,
//! accounts locked by the password expiration task).
//!
//! Delivery goes through a [`Notifier`]: SMTP via lettre when configured,
//! otherwise the message is only logged.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::services::metrics_service;
use crate::store::{Store, UserStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    PasswordExpires,
    PasswordForget,
    UserLocked,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::PasswordExpires => "password_expires",
            NotificationEvent::PasswordForget => "password_forget",
            NotificationEvent::UserLocked => "user_locked",
        }
    }
}

/// A rendered message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub event: NotificationEvent,
    pub users_id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log instead of sending them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            event = notification.event.as_str(),
            users_id = notification.users_id,
            recipient = %notification.recipient,
            "Notification: {}",
            notification.subject
        );
        Ok(())
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP relay '{}': {}", config.host, e)))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid SMTP_FROM '{}': {}", config.from, e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let to = notification.recipient.parse::<Mailbox>().map_err(|e| {
            AppError::Notification(format!(
                "Invalid recipient '{}': {}",
                notification.recipient, e
            ))
        })?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject.clone())
            .body(notification.body.clone())
            .map_err(|e| AppError::Notification(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Notification(format!("SMTP delivery failed: {}", e)))?;
        Ok(())
    }
}

/// Details rendered into the message body.
#[derive(Debug, Clone)]
pub enum NotificationDetail {
    ExpiresAt(Option<DateTime<Utc>>),
    ForgetToken(String),
    None,
}

/// Resolves recipients and renders messages before handing them to the notifier.
pub struct NotificationService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Notify the user at their default address.
    ///
    /// Returns false when the user has no address; the event is then only logged.
    pub async fn notify_user(
        &self,
        event: NotificationEvent,
        user: &User,
        detail: NotificationDetail,
    ) -> Result<bool> {
        let emails = self.store.list_user_emails(user.id).await?;
        let recipient = emails
            .iter()
            .find(|e| e.is_default)
            .or_else(|| emails.first())
            .map(|e| e.email.clone());

        let Some(recipient) = recipient else {
            tracing::warn!(
                "No email address for user {} ({}), {} notification not delivered",
                user.name,
                user.id,
                event.as_str()
            );
            return Ok(false);
        };

        let notification = render(event, user, recipient, &detail);
        self.notifier.deliver(&notification).await?;
        metrics_service::record_notification(event.as_str());
        Ok(true)
    }
}

fn render(
    event: NotificationEvent,
    user: &User,
    recipient: String,
    detail: &NotificationDetail,
) -> Notification {
    let name = user.friendly_name();
    let (subject, body) = match (event, detail) {
        (NotificationEvent::PasswordExpires, NotificationDetail::ExpiresAt(Some(at))) => (
            "Your password will expire soon".to_string(),
            format!(
                "Hello {},\n\nYour password expires on {}. Please change it before then.",
                name,
                at.format("%Y-%m-%d %H:%M UTC")
            ),
        ),
        (NotificationEvent::PasswordExpires, _) => (
            "Your password has expired".to_string(),
            format!("Hello {},\n\nYour password has expired. Please change it.", name),
        ),
        (NotificationEvent::PasswordForget, NotificationDetail::ForgetToken(token)) => (
            "Password reset request".to_string(),
            format!(
                "Hello {},\n\nUse the following token to reset your password within 24 hours:\n\n{}",
                name, token
            ),
        ),
        (NotificationEvent::PasswordForget, _) => (
            "Password reset request".to_string(),
            format!("Hello {},\n\nA password reset was requested.", name),
        ),
        (NotificationEvent::UserLocked, _) => (
            "Your account has been locked".to_string(),
            format!(
                "Hello {},\n\nYour account was deactivated because your password expired. \
                 Please contact an administrator.",
                name
            ),
        ),
    };

    Notification {
        event,
        users_id: user.id,
        recipient,
        subject,
        body,
    }
}

/// Notifier that keeps every delivered message, for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: tokio::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}
