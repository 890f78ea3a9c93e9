//! Push payload parsing and notification construction.

use serde::{Deserialize, Serialize};

/// Best-effort structured push payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl PushPayload {
    /// Parse raw push data.
    ///
    /// JSON objects are read field by field; anything else becomes the body
    /// text. Empty data yields `None` and no notification is shown.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        match serde_json::from_slice::<PushPayload>(data) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::debug!(error = %e, "push payload is not JSON, using text body");
                let text = String::from_utf8_lossy(data).trim().to_string();
                Some(PushPayload { body: Some(text), ..Default::default() })
            }
        }
    }
}

/// Deployment-wide notification defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDefaults {
    pub app_name: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub start_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
    pub timestamp: i64,
}

/// A platform notification ready to be shown by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
    pub require_interaction: bool,
}

/// The action id that closes a notification without further work.
pub const DISMISS_ACTION: &str = "dismiss";
pub const OPEN_ACTION: &str = "open";

impl Notification {
    pub fn from_payload(payload: PushPayload, defaults: &NotificationDefaults, timestamp: i64) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| defaults.app_name.clone()),
            body: payload
                .body
                .unwrap_or_else(|| format!("{} Notification", defaults.app_name)),
            icon: payload.icon.unwrap_or_else(|| defaults.icon.clone()),
            badge: defaults.badge.clone(),
            tag: payload.tag.unwrap_or_else(|| defaults.tag.clone()),
            data: NotificationData { url: payload.url.unwrap_or_else(|| defaults.start_url.clone()), timestamp },
            actions: vec![
                NotificationAction { action: OPEN_ACTION.into(), title: "Open App".into() },
                NotificationAction { action: DISMISS_ACTION.into(), title: "Dismiss".into() },
            ],
            require_interaction: true,
        }
    }
}
