//! Drives the dashboard from snapshot sources and user actions

use super::state::{Dashboard, PanelKind, Tab, ToastLevel};
use super::subscription::{PollingSource, SnapshotSource};
use crate::error::Result;
use crate::net::{BackendClient, PortfolioStock};
use futures_util::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Owns the dashboard view-model and everything that mutates it
pub struct DashboardController {
    dashboard: Arc<RwLock<Dashboard>>,
    client: BackendClient,
    sources: Vec<Arc<dyn SnapshotSource>>,
}

impl DashboardController {
    pub fn new(client: BackendClient, sources: Vec<Arc<dyn SnapshotSource>>) -> Self {
        Self {
            dashboard: Arc::new(RwLock::new(Dashboard::new())),
            client,
            sources,
        }
    }

    /// Controller polling all three panels over REST
    pub fn polling(client: BackendClient, interval: Duration) -> Self {
        let sources = PanelKind::ALL
            .iter()
            .map(|&panel| {
                Arc::new(PollingSource::new(client.clone(), panel, interval))
                    as Arc<dyn SnapshotSource>
            })
            .collect();
        Self::new(client, sources)
    }

    /// Current view-model
    pub fn snapshot(&self) -> Dashboard {
        self.dashboard.read().clone()
    }

    /// Consume every source until they end (polling sources never do)
    pub async fn run(&self) {
        let streams = self.sources.iter().map(|source| {
            let panel = source.panel();
            source.subscribe().map(move |result| (panel, result))
        });
        let mut merged = stream::select_all(streams);

        while let Some((panel, result)) = merged.next().await {
            let mut dashboard = self.dashboard.write();
            match result {
                Ok(snapshot) => dashboard.apply(snapshot),
                Err(e) => {
                    tracing::warn!("Refresh of {:?} failed: {}", panel, e);
                    dashboard.set_error(panel, e.to_string());
                }
            }
        }
    }

    /// Manual retry control on a panel
    pub async fn refresh(&self, panel: PanelKind) {
        self.dashboard.write().set_loading(panel);
        let result = PollingSource::fetch_once(&self.client, panel).await;

        let mut dashboard = self.dashboard.write();
        match result {
            Ok(snapshot) => dashboard.apply(snapshot),
            Err(e) => {
                dashboard.set_error(panel, e.to_string());
                dashboard.push_toast(ToastLevel::Error, e.to_string());
            }
        }
    }

    /// Follow a `?tab=` deep link; URLs without one leave the tab alone
    pub fn select_tab(&self, url: &Url) -> Option<Tab> {
        let tab = Tab::from_url(url)?;
        self.dashboard.write().select_tab(tab);
        tracing::debug!("Dashboard tab -> {:?}", tab);
        Some(tab)
    }

    pub async fn search(&self, query: &str) -> Vec<Value> {
        match self.client.search_stocks(query).await {
            Ok(results) => results,
            Err(e) => {
                self.toast(ToastLevel::Error, e.to_string());
                Vec::new()
            }
        }
    }

    pub async fn add_to_portfolio(&self, stock: PortfolioStock) -> Result<()> {
        let symbol = stock.symbol.trim().to_uppercase();
        match self.client.add_to_portfolio(&stock).await {
            Ok(_) => {
                self.toast(ToastLevel::Success, format!("Added {} to portfolio", symbol));
                self.refresh(PanelKind::Portfolio).await;
                Ok(())
            }
            Err(e) => {
                self.toast(ToastLevel::Error, e.to_string());
                Err(e)
            }
        }
    }

    pub async fn remove_from_portfolio(&self, symbol: &str) -> Result<()> {
        let symbol = symbol.trim().to_uppercase();
        match self.client.remove_from_portfolio(&symbol).await {
            Ok(_) => {
                self.toast(ToastLevel::Success, format!("Removed {} from portfolio", symbol));
                self.refresh(PanelKind::Portfolio).await;
                self.refresh(PanelKind::ExitSignals).await;
                Ok(())
            }
            Err(e) => {
                self.toast(ToastLevel::Error, e.to_string());
                Err(e)
            }
        }
    }

    /// Ask the backend for a squeeze scan now, then reload the buy signals
    pub async fn scan_squeezes(&self) -> Result<()> {
        self.trigger(self.client.scan_squeezes().await, "Squeeze scan started", PanelKind::Opportunities)
            .await
    }

    /// Ask the backend to run the portfolio monitor now, then reload the sell signals
    pub async fn monitor_portfolio(&self) -> Result<()> {
        self.trigger(
            self.client.monitor_portfolio().await,
            "Portfolio monitor started",
            PanelKind::ExitSignals,
        )
        .await
    }

    async fn trigger(&self, result: Result<Value>, message: &str, panel: PanelKind) -> Result<()> {
        match result {
            Ok(_) => {
                self.toast(ToastLevel::Info, message);
                self.refresh(panel).await;
                Ok(())
            }
            Err(e) => {
                self.toast(ToastLevel::Error, e.to_string());
                Err(e)
            }
        }
    }

    fn toast(&self, level: ToastLevel, message: impl Into<String>) {
        self.dashboard.write().push_toast(level, message);
    }
}
