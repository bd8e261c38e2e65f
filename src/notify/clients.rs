//! Client windows controlled by the worker

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use url::Url;

/// An open application window
#[derive(Debug, Clone, Serialize)]
pub struct ClientWindow {
    pub id: String,
    pub url: Url,
    pub focused: bool,
    /// Whether the active worker controls this window
    pub controlled: bool,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Opened(ClientWindow),
    Focused(ClientWindow),
    /// Worker took control of this many windows
    Claimed(usize),
}

/// Window management surface
#[async_trait]
pub trait Clients: Send + Sync {
    /// Take control of every open window
    async fn claim(&self) -> Result<usize>;

    async fn open_window(&self, url: Url) -> Result<ClientWindow>;

    /// Focus a window already showing `url`, or open a new one
    async fn focus_or_open(&self, url: Url) -> Result<ClientWindow>;

    async fn list(&self) -> Result<Vec<ClientWindow>>;
}

/// In-process registry of app windows
pub struct ClientRegistry {
    windows: DashMap<String, ClientWindow>,
    events: broadcast::Sender<ClientEvent>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            windows: DashMap::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Track a window the user opened themselves
    pub fn register(&self, url: Url) -> ClientWindow {
        let window = ClientWindow {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            focused: false,
            controlled: false,
            opened_at: Utc::now(),
        };
        self.windows.insert(window.id.clone(), window.clone());
        window
    }

    fn focus(&self, id: &str) -> Option<ClientWindow> {
        for mut entry in self.windows.iter_mut() {
            entry.focused = entry.id == id;
        }
        self.windows.get(id).map(|w| w.clone())
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clients for ClientRegistry {
    async fn claim(&self) -> Result<usize> {
        let mut claimed = 0;
        for mut entry in self.windows.iter_mut() {
            if !entry.controlled {
                entry.controlled = true;
                claimed += 1;
            }
        }
        tracing::debug!("Claimed {} client window(s)", claimed);
        let _ = self.events.send(ClientEvent::Claimed(claimed));
        Ok(claimed)
    }

    async fn open_window(&self, url: Url) -> Result<ClientWindow> {
        let window = self.register(url);
        let window = self.focus(&window.id).unwrap_or(window);
        tracing::info!("Opening window at {}", window.url);
        let _ = self.events.send(ClientEvent::Opened(window.clone()));
        Ok(window)
    }

    async fn focus_or_open(&self, url: Url) -> Result<ClientWindow> {
        let existing = self
            .windows
            .iter()
            .find(|w| w.url == url)
            .map(|w| w.id.clone());

        match existing.and_then(|id| self.focus(&id)) {
            Some(window) => {
                tracing::info!("Focusing window at {}", window.url);
                let _ = self.events.send(ClientEvent::Focused(window.clone()));
                Ok(window)
            }
            None => self.open_window(url).await,
        }
    }

    async fn list(&self) -> Result<Vec<ClientWindow>> {
        let mut windows: Vec<ClientWindow> = self.windows.iter().map(|w| w.clone()).collect();
        windows.sort_by_key(|w| w.opened_at);
        Ok(windows)
    }
}
