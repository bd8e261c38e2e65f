//! Push and notification-click handlers

use super::WorkerContext;
use crate::error::Result;
use crate::notify::{ClientWindow, Notification, NotificationAction};
use serde::Serialize;
use serde_json::json;

pub const NOTIFICATION_TITLE: &str = "Squeeze Tracker";
pub const DEFAULT_PUSH_BODY: &str = "New squeeze opportunity detected!";
pub const NOTIFICATION_ICON: &str = "/icon-192x192.png";
pub const NOTIFICATION_BADGE: &str = "/icon-72x72.png";
pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

pub const ACTION_EXPLORE: &str = "explore";
pub const ACTION_CLOSE: &str = "close";

/// Deep link for "View Details"
pub const EXPLORE_ROUTE: &str = "/?tab=buy";
pub const DEFAULT_ROUTE: &str = "/";

/// What a notification click led to
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "window", rename_all = "snake_case")]
pub enum ClickOutcome {
    Opened(ClientWindow),
    Dismissed,
}

/// Notification for an inbound push.
///
/// A payload is used verbatim as the body text; only a missing or
/// zero-length payload falls back to the default message.
pub fn build_notification(payload: Option<&[u8]>) -> Notification {
    let body = match payload {
        Some(bytes) if !bytes.is_empty() => String::from_utf8_lossy(bytes).into_owned(),
        _ => DEFAULT_PUSH_BODY.to_string(),
    };

    let mut notification = Notification::new(NOTIFICATION_TITLE, body, NOTIFICATION_ICON);
    notification.badge = Some(NOTIFICATION_BADGE.to_string());
    notification.vibrate = VIBRATE_PATTERN.to_vec();
    notification.actions = vec![
        NotificationAction::new(ACTION_EXPLORE, "View Details").with_icon(NOTIFICATION_ICON),
        NotificationAction::new(ACTION_CLOSE, "Close").with_icon(NOTIFICATION_ICON),
    ];
    notification.data = json!({
        "dateOfArrival": notification.created_at.timestamp_millis(),
    });
    notification
}

pub async fn handle_push(ctx: &WorkerContext, payload: Option<&[u8]>) -> Result<Notification> {
    let notification = build_notification(payload);
    ctx.notifier.show(notification.clone()).await?;
    Ok(notification)
}

/// Close the clicked notification and route the action
pub async fn handle_notification_click(
    ctx: &WorkerContext,
    notification_id: Option<&str>,
    action: &str,
) -> Result<ClickOutcome> {
    if let Some(id) = notification_id {
        ctx.notifier.close(id).await?;
    }

    let route = match action {
        ACTION_CLOSE => return Ok(ClickOutcome::Dismissed),
        ACTION_EXPLORE => EXPLORE_ROUTE,
        // Click on the notification body itself
        _ => DEFAULT_ROUTE,
    };

    let url = ctx.config.resolve(route)?;
    let window = ctx.clients.focus_or_open(url).await?;
    Ok(ClickOutcome::Opened(window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::notify::Clients;
    use crate::worker::testing::harness;

    #[tokio::test]
    async fn test_push_without_payload_uses_default_body() {
        let h = harness(Config::default());
        let shown = handle_push(&h.ctx, None).await.unwrap();

        assert_eq!(shown.body, "New squeeze opportunity detected!");
        assert_eq!(shown.vibrate, vec![100, 50, 100]);
        let actions: Vec<&str> = shown.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["explore", "close"]);
        assert_eq!(h.notifications.displayed().len(), 1);
    }

    #[tokio::test]
    async fn test_push_payload_is_text() {
        let h = harness(Config::default());
        let shown = handle_push(&h.ctx, Some(b"GME up 120%".as_slice())).await.unwrap();
        assert_eq!(shown.body, "GME up 120%");

        let padded = build_notification(Some(b"  AMC halted ".as_slice()));
        assert_eq!(padded.body, "  AMC halted ");

        let empty = build_notification(Some(b"".as_slice()));
        assert_eq!(empty.body, DEFAULT_PUSH_BODY);
    }

    #[tokio::test]
    async fn test_explore_opens_buy_tab() {
        let h = harness(Config::default());
        let shown = handle_push(&h.ctx, None).await.unwrap();

        let outcome = handle_notification_click(&h.ctx, Some(&shown.id), "explore")
            .await
            .unwrap();

        match outcome {
            ClickOutcome::Opened(window) => {
                assert_eq!(window.url.path(), "/");
                assert_eq!(window.url.query(), Some("tab=buy"));
            }
            ClickOutcome::Dismissed => panic!("expected a window"),
        }
        assert!(h.notifications.displayed().is_empty());
    }

    #[tokio::test]
    async fn test_close_action_opens_nothing() {
        let h = harness(Config::default());
        let outcome = handle_notification_click(&h.ctx, None, "close").await.unwrap();
        assert!(matches!(outcome, ClickOutcome::Dismissed));
        assert!(h.clients.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_body_click_opens_root() {
        let h = harness(Config::default());
        let outcome = handle_notification_click(&h.ctx, None, "").await.unwrap();
        match outcome {
            ClickOutcome::Opened(window) => assert_eq!(window.url.as_str(), "http://localhost:8000/"),
            ClickOutcome::Dismissed => panic!("expected a window"),
        }
    }
}
