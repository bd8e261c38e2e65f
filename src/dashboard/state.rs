//! Panel state and toasts

use super::subscription::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use url::Url;

/// Squeeze opportunities shown at once
pub const TOP_OPPORTUNITIES: usize = 20;

const MAX_TOASTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Portfolio,
    /// "Buy" signals
    Opportunities,
    /// "Sell" signals
    ExitSignals,
}

impl PanelKind {
    pub const ALL: [PanelKind; 3] = [
        PanelKind::Portfolio,
        PanelKind::Opportunities,
        PanelKind::ExitSignals,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Portfolio,
    Buy,
    Sell,
}

impl Tab {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "portfolio" => Some(Self::Portfolio),
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }

    /// Tab requested by a `?tab=` deep link
    pub fn from_url(url: &Url) -> Option<Self> {
        url.query_pairs()
            .find(|(key, _)| key == "tab")
            .and_then(|(_, value)| Self::parse(&value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum PanelState {
    Loading,
    Ready(Vec<Value>),
    /// Shown inline with a manual retry control
    Error(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Panel {
    pub kind: PanelKind,
    pub state: PanelState,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Panel {
    fn new(kind: PanelKind) -> Self {
        Self {
            kind,
            state: PanelState::Loading,
            updated_at: None,
        }
    }

    pub fn items(&self) -> &[Value] {
        match &self.state {
            PanelState::Ready(items) => items,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// Transient banner
#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// View-model behind the three dashboard panels
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub tab: Tab,
    portfolio: Panel,
    opportunities: Panel,
    exit_signals: Panel,
    toasts: VecDeque<Toast>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            tab: Tab::Portfolio,
            portfolio: Panel::new(PanelKind::Portfolio),
            opportunities: Panel::new(PanelKind::Opportunities),
            exit_signals: Panel::new(PanelKind::ExitSignals),
            toasts: VecDeque::new(),
        }
    }

    pub fn panel(&self, kind: PanelKind) -> &Panel {
        match kind {
            PanelKind::Portfolio => &self.portfolio,
            PanelKind::Opportunities => &self.opportunities,
            PanelKind::ExitSignals => &self.exit_signals,
        }
    }

    fn panel_mut(&mut self, kind: PanelKind) -> &mut Panel {
        match kind {
            PanelKind::Portfolio => &mut self.portfolio,
            PanelKind::Opportunities => &mut self.opportunities,
            PanelKind::ExitSignals => &mut self.exit_signals,
        }
    }

    /// Replace a panel's content with a full snapshot
    pub fn apply(&mut self, snapshot: Snapshot) {
        let mut items = snapshot.items;
        if snapshot.panel == PanelKind::Opportunities {
            items.sort_by(|a, b| score(b).total_cmp(&score(a)));
            items.truncate(TOP_OPPORTUNITIES);
        }

        let panel = self.panel_mut(snapshot.panel);
        panel.state = PanelState::Ready(items);
        panel.updated_at = Some(snapshot.received_at);
    }

    pub fn set_loading(&mut self, kind: PanelKind) {
        self.panel_mut(kind).state = PanelState::Loading;
    }

    pub fn set_error(&mut self, kind: PanelKind, message: impl Into<String>) {
        self.panel_mut(kind).state = PanelState::Error(message.into());
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    pub fn push_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        if self.toasts.len() == MAX_TOASTS {
            self.toasts.pop_front();
        }
        self.toasts.push_back(Toast {
            level,
            message: message.into(),
            created_at: Utc::now(),
        });
    }

    pub fn toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    /// Hand pending toasts to the renderer
    pub fn drain_toasts(&mut self) -> Vec<Toast> {
        self.toasts.drain(..).collect()
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

fn score(item: &Value) -> f64 {
    item.get("squeeze_score")
        .or_else(|| item.get("score"))
        .and_then(Value::as_f64)
        .unwrap_or(f64::NEG_INFINITY)
}
