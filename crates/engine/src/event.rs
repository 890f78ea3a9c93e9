//! Events delivered to an engine and the outcomes it hands back.
//!
//! The engine never performs host-side work itself. Anything that touches
//! open pages or the platform (claiming clients, showing notifications,
//! focusing windows) comes back as an [`Effect`] for the host to apply.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use swcache_core::{Broadcast, Notification, Reply, Request, Response};

/// A page known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub url: String,
}

/// A posted control message with its optional reply port.
#[derive(Debug)]
pub struct MessageEvent {
    pub data: Value,
    pub reply: Option<oneshot::Sender<Reply>>,
}

impl MessageEvent {
    pub fn new(data: Value) -> Self {
        Self { data, reply: None }
    }

    /// Attach a reply port and return the receiving half.
    pub fn with_reply(data: Value) -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (Self { data, reply: Some(tx) }, rx)
    }
}

/// A click on a shown notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationClick {
    /// Action id; `None` when the notification body itself was clicked.
    pub action: Option<String>,
    /// Target URL carried in the notification data.
    pub url: Option<String>,
    /// Pages open at the time of the click.
    pub clients: Vec<ClientInfo>,
}

#[derive(Debug)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Message(MessageEvent),
    Push(Bytes),
    NotificationClick(NotificationClick),
    /// Recurring sync identified by tag.
    PeriodicSync(String),
    /// One-shot sync identified by tag.
    Sync(String),
}

impl Event {
    /// Event kind for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::Activate => "activate",
            Event::Fetch(_) => "fetch",
            Event::Message(_) => "message",
            Event::Push(_) => "push",
            Event::NotificationClick(_) => "notificationclick",
            Event::PeriodicSync(_) => "periodicsync",
            Event::Sync(_) => "sync",
        }
    }
}

/// Host-side work requested by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Activate this engine without waiting for pages to close.
    SkipWaiting,
    /// Take control of pages that are already open.
    Claim,
    /// Post a message to every open page.
    Broadcast(Broadcast),
    ShowNotification(Notification),
    /// Focus the page with this client id.
    FocusClient(String),
    /// Open a new page at this URL.
    OpenWindow(String),
}

/// Result of handling one event.
///
/// For fetch events a `None` response means the request is not intercepted
/// and the host forwards it to the network untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub response: Option<Response>,
    pub effects: Vec<Effect>,
}

impl Outcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn pass_through() -> Self {
        Self::default()
    }

    pub fn respond(response: Response) -> Self {
        Self { response: Some(response), effects: Vec::new() }
    }

    pub fn effects(effects: Vec<Effect>) -> Self {
        Self { response: None, effects }
    }

    pub fn has_effect(&self, effect: &Effect) -> bool {
        self.effects.contains(effect)
    }
}
