//! Offline-cache service worker
//!
//! Every platform event (install, activate, fetch, push, sync,
//! notification click) is a message handled by a single event loop; the
//! handlers below do the actual work against the shared `WorkerContext`.

mod activate;
mod events;
mod fetch;
mod install;
mod lifecycle;
mod push;
mod registration;
mod sync;

pub use activate::ActivateReport;
pub use events::{ServiceWorker, WorkerEvent, WorkerHandle};
pub use fetch::{FetchResult, FetchSource};
pub use install::InstallReport;
pub use lifecycle::{Lifecycle, LifecycleEvent, WorkerState};
pub use push::{
    build_notification, ClickOutcome, ACTION_CLOSE, ACTION_EXPLORE, DEFAULT_PUSH_BODY,
    EXPLORE_ROUTE,
};
pub use registration::Registration;

use crate::config::Config;
use crate::db::sqlite::SqliteDb;
use crate::net::Network;
use crate::notify::{Clients, Notifier};
use std::sync::Arc;

/// Collaborators shared by all handlers of one worker
pub struct WorkerContext {
    pub config: Arc<Config>,
    pub db: Arc<SqliteDb>,
    pub network: Arc<dyn Network>,
    pub notifier: Arc<dyn Notifier>,
    pub clients: Arc<dyn Clients>,
}

impl WorkerContext {
    pub fn new(
        config: Arc<Config>,
        db: Arc<SqliteDb>,
        network: Arc<dyn Network>,
        notifier: Arc<dyn Notifier>,
        clients: Arc<dyn Clients>,
    ) -> Self {
        Self {
            config,
            db,
            network,
            notifier,
            clients,
        }
    }

    /// Name of the bucket this worker reads and writes
    pub fn bucket(&self) -> &str {
        &self.config.cache_version
    }
}
