//! Notification display and client windows
//!
//! The two platform surfaces the worker talks to besides storage and the
//! network: OS-level notifications and the app's open windows.

mod clients;
mod notification;

pub use clients::{ClientEvent, ClientRegistry, ClientWindow, Clients};
pub use notification::{
    Notification, NotificationAction, NotificationCenter, NotificationEvent, Notifier,
};
