//! Notification model and the in-process notification center

use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Button shown on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// OS-level notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub tag: Option<String>,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: Option<String>,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tag: None,
            title: title.into(),
            body: body.into(),
            icon: icon.into(),
            badge: None,
            vibrate: Vec::new(),
            actions: Vec::new(),
            data: Value::Null,
            created_at: Utc::now(),
        }
    }
}

/// Display surface for notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: Notification) -> Result<()>;

    async fn close(&self, id: &str) -> Result<()>;
}

/// Change broadcast to notification listeners
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Shown(Notification),
    Closed(String),
}

/// Keeps the currently displayed notifications and fans out changes
pub struct NotificationCenter {
    displayed: DashMap<String, Notification>,
    events: broadcast::Sender<NotificationEvent>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            displayed: DashMap::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.displayed.get(id).map(|n| n.clone())
    }

    /// Displayed notifications, oldest first
    pub fn displayed(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self.displayed.iter().map(|n| n.clone()).collect();
        all.sort_by_key(|n| n.created_at);
        all
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for NotificationCenter {
    async fn show(&self, notification: Notification) -> Result<()> {
        if notification.title.is_empty() {
            return Err(AppError::Validation("Notification title is required".to_string()));
        }

        // A notification with the same tag replaces the previous one
        if let Some(tag) = &notification.tag {
            self.displayed.retain(|_, n| n.tag.as_ref() != Some(tag));
        }

        tracing::info!("Notification: {} - {}", notification.title, notification.body);
        self.displayed
            .insert(notification.id.clone(), notification.clone());
        // No receivers is fine
        let _ = self.events.send(NotificationEvent::Shown(notification));
        Ok(())
    }

    async fn close(&self, id: &str) -> Result<()> {
        if self.displayed.remove(id).is_some() {
            let _ = self.events.send(NotificationEvent::Closed(id.to_string()));
        }
        Ok(())
    }
}
