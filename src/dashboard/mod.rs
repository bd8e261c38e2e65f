//! Dashboard view-model
//!
//! One owned `Dashboard` holds the three panels; snapshot sources feed it
//! full replacements and the controller turns user actions into backend
//! calls and toasts.

mod controller;
mod state;
mod subscription;

pub use controller::DashboardController;
pub use state::{Dashboard, Panel, PanelKind, PanelState, Tab, Toast, ToastLevel, TOP_OPPORTUNITIES};
pub use subscription::{PollingSource, Snapshot, SnapshotSource, SnapshotStream};
