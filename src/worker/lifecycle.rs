//! Worker lifecycle state machine
//!
//! Uninitialized -> Installing -> Installed -> Activating -> Active, with
//! Superseded reachable from any live state once a newer version takes over.

use crate::error::{AppError, Result};
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Uninitialized,
    Installing,
    Installed,
    Activating,
    Active,
    Superseded,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Superseded => "superseded",
        };
        f.write_str(name)
    }
}

/// Broadcast on every lifecycle change
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    StateChange {
        version: String,
        old_state: WorkerState,
        new_state: WorkerState,
    },
    /// Worker took control of open clients
    ControllerChange { version: String },
}

fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;
    matches!(
        (from, to),
        (Uninitialized, Installing)
            | (Installing, Installed)
            | (Installed, Activating)
            | (Activating, Active)
            | (Uninitialized | Installing | Installed | Activating | Active, Superseded)
    )
}

/// Lifecycle of one worker version
pub struct Lifecycle {
    version: String,
    state: WorkerState,
    events: broadcast::Sender<LifecycleEvent>,
}

impl Lifecycle {
    /// Fresh worker that still has to install
    pub fn new(version: impl Into<String>) -> Self {
        Self::starting_in(version, WorkerState::Uninitialized)
    }

    /// Worker whose version already completed activation in an earlier run
    pub fn resumed(version: impl Into<String>) -> Self {
        Self::starting_in(version, WorkerState::Active)
    }

    fn starting_in(version: impl Into<String>, state: WorkerState) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            version: version.into(),
            state,
            events,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == WorkerState::Active
    }

    pub fn sender(&self) -> broadcast::Sender<LifecycleEvent> {
        self.events.clone()
    }

    pub fn transition(&mut self, new_state: WorkerState) -> Result<()> {
        let old_state = self.state;
        if !is_valid_transition(old_state, new_state) {
            return Err(AppError::Lifecycle(format!(
                "{}: cannot go from {} to {}",
                self.version, old_state, new_state
            )));
        }

        self.state = new_state;
        tracing::info!("Worker {}: {} -> {}", self.version, old_state, new_state);
        let _ = self.events.send(LifecycleEvent::StateChange {
            version: self.version.clone(),
            old_state,
            new_state,
        });
        Ok(())
    }

    /// Announce that this version now controls the open clients
    pub fn controller_change(&self) -> Result<()> {
        if !self.is_active() {
            return Err(AppError::Lifecycle(format!(
                "{}: only an active worker can claim clients",
                self.version
            )));
        }
        let _ = self.events.send(LifecycleEvent::ControllerChange {
            version: self.version.clone(),
        });
        Ok(())
    }
}
