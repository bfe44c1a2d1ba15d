//! User-facing notifications and confirmations.
//!
//! The core only calls these capabilities; drawing toasts and dialogs is
//! left to whoever implements [`Notifier`] and [`Confirmer`].

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// How long a notification stays up by default
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Timed(Duration),
    /// Stays until dismissed
    Persistent,
}

impl Default for Display {
    fn default() -> Self {
        Self::Timed(DEFAULT_NOTIFICATION_DURATION)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub display: Display,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            display: Display::default(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn persistent(mut self) -> Self {
        self.display = Display::Persistent;
        self
    }
}

/// A question put to the user before a destructive action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    /// Destructive styling for the confirm button
    pub dangerous: bool,
}

impl ConfirmRequest {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: "Confirm".to_string(),
            dangerous: false,
        }
    }

    /// Destructive action with a custom confirm label
    pub fn dangerous(mut self, confirm_label: impl Into<String>) -> Self {
        self.confirm_label = confirm_label.into();
        self.dangerous = true;
        self
    }
}

/// Fire-and-forget status messages
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Blocking-style accept or decline question
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: ConfirmRequest) -> bool;
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Error => error!("{}", notification.message),
            Severity::Warning => warn!("{}", notification.message),
            Severity::Success | Severity::Info => info!("{}", notification.message),
        }
    }
}

/// Forwards notifications to a view over a channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification dropped, no view listening");
        }
    }
}

/// A confirmation waiting for the view's answer
#[derive(Debug)]
pub struct PendingConfirmation {
    pub request: ConfirmRequest,
    reply: oneshot::Sender<bool>,
}

impl PendingConfirmation {
    pub fn accept(self) {
        let _ = self.reply.send(true);
    }

    pub fn decline(self) {
        let _ = self.reply.send(false);
    }
}

/// Sends each request to a view and waits for the answer.
///
/// A request the view drops without answering counts as declined, as does
/// having no view at all.
#[derive(Debug, Clone)]
pub struct ChannelConfirmer {
    tx: mpsc::Sender<PendingConfirmation>,
}

impl ChannelConfirmer {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingConfirmation>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Confirmer for ChannelConfirmer {
    async fn confirm(&self, request: ConfirmRequest) -> bool {
        let (reply, answer) = oneshot::channel();
        if self.tx.send(PendingConfirmation { request, reply }).await.is_err() {
            debug!("Confirmation declined, no view listening");
            return false;
        }
        answer.await.unwrap_or(false)
    }
}

/// Answers every request the same way
#[derive(Debug, Clone, Copy)]
pub struct StaticConfirmer(pub bool);

#[async_trait]
impl Confirmer for StaticConfirmer {
    async fn confirm(&self, _request: ConfirmRequest) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_defaults() {
        let notification = Notification::success("Saved");
        assert_eq!(notification.severity, Severity::Success);
        assert_eq!(
            notification.display,
            Display::Timed(Duration::from_secs(4))
        );
        assert_eq!(
            Notification::error("Boom").persistent().display,
            Display::Persistent
        );
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Notification::info("Hello"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "Hello");

        drop(rx);
        // No receiver left; must not panic
        notifier.notify(Notification::info("Nobody"));
    }

    #[tokio::test]
    async fn test_channel_confirmer_answers() {
        let (confirmer, mut rx) = ChannelConfirmer::new(4);
        let view = tokio::spawn(async move {
            let first = rx.recv().await.unwrap();
            assert!(first.request.dangerous);
            first.accept();

            let second = rx.recv().await.unwrap();
            second.decline();

            // Dropped without an answer
            let third = rx.recv().await.unwrap();
            drop(third);
        });

        let request = ConfirmRequest::new("Delete", "Delete this entry?").dangerous("Delete");
        assert!(confirmer.confirm(request.clone()).await);
        assert!(!confirmer.confirm(request.clone()).await);
        assert!(!confirmer.confirm(request).await);
        view.await.unwrap();
    }

    #[tokio::test]
    async fn test_confirmer_without_view_declines() {
        let (confirmer, rx) = ChannelConfirmer::new(1);
        drop(rx);
        assert!(!confirmer.confirm(ConfirmRequest::new("Logout", "Log out?")).await);
        assert!(StaticConfirmer(true).confirm(ConfirmRequest::new("a", "b")).await);
    }
}
