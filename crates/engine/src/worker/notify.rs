//! Push delivery and notification clicks.

use super::Engine;
use crate::fetch::resolve;
use crate::{Effect, NotificationClick, Outcome};
use swcache_core::push::DISMISS_ACTION;
use swcache_core::{Notification, PushPayload};

impl Engine {
    pub(super) fn on_push(&self, data: &[u8]) -> Outcome {
        let Some(payload) = PushPayload::parse(data) else {
            tracing::debug!("empty push payload, nothing to show");
            return Outcome::none();
        };

        let defaults = self.config.notification_defaults();
        let notification = Notification::from_payload(payload, &defaults, chrono::Utc::now().timestamp_millis());
        tracing::info!(title = %notification.title, tag = %notification.tag, "showing notification");
        Outcome::effects(vec![Effect::ShowNotification(notification)])
    }

    /// Focus a page already showing the target URL, else open one.
    pub(super) fn on_notification_click(&self, click: NotificationClick) -> Outcome {
        if click.action.as_deref() == Some(DISMISS_ACTION) {
            return Outcome::none();
        }

        let target = click.url.unwrap_or_else(|| self.config.start_url.clone());
        let target = match resolve(self.routes.origin(), &target) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "bad notification target");
                return Outcome::none();
            }
        };

        let existing = click.clients.into_iter().find(|client| {
            resolve(self.routes.origin(), &client.url).is_ok_and(|url| url.as_str() == target)
        });

        match existing {
            Some(client) => Outcome::effects(vec![Effect::FocusClient(client.id)]),
            None => Outcome::effects(vec![Effect::OpenWindow(target)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::testing::{ScriptedNetwork, engine_with, test_config};
    use crate::{ClientInfo, Effect, Event, NotificationClick};
    use swcache_core::CacheDb;

    async fn engine() -> crate::Engine {
        engine_with(test_config(), CacheDb::open_in_memory().await.unwrap(), Arc::new(ScriptedNetwork::new()))
    }

    #[tokio::test]
    async fn test_push_shows_notification_with_two_actions() {
        let engine = engine().await;
        let outcome = engine
            .handle(Event::Push(Bytes::from_static(br#"{"title":"X","body":"Y"}"#)))
            .await
            .unwrap();

        let [Effect::ShowNotification(notification)] = outcome.effects.as_slice() else {
            panic!("expected one notification, got {:?}", outcome.effects)
        };
        assert_eq!(notification.title, "X");
        assert_eq!(notification.body, "Y");
        assert_eq!(notification.actions.len(), 2);
        assert!(notification.require_interaction);
    }

    #[tokio::test]
    async fn test_push_text_payload_uses_app_name() {
        let engine = engine().await;
        let outcome = engine.handle(Event::Push(Bytes::from_static(b"hello"))).await.unwrap();
        let [Effect::ShowNotification(notification)] = outcome.effects.as_slice() else { panic!("no notification") };
        assert_eq!(notification.title, "Test App");
        assert_eq!(notification.body, "hello");
    }

    #[tokio::test]
    async fn test_empty_push_shows_nothing() {
        let engine = engine().await;
        let outcome = engine.handle(Event::Push(Bytes::new())).await.unwrap();
        assert!(outcome.effects.is_empty());
    }

    #[tokio::test]
    async fn test_dismiss_does_nothing() {
        let engine = engine().await;
        let click = NotificationClick { action: Some("dismiss".into()), ..Default::default() };
        let outcome = engine.handle(Event::NotificationClick(click)).await.unwrap();
        assert!(outcome.effects.is_empty());
    }

    #[tokio::test]
    async fn test_click_focuses_matching_client() {
        let engine = engine().await;
        let click = NotificationClick {
            action: Some("open".into()),
            url: Some("/news".into()),
            clients: vec![
                ClientInfo { id: "a".into(), url: "https://app.test/".into() },
                ClientInfo { id: "b".into(), url: "https://app.test/news".into() },
            ],
        };
        let outcome = engine.handle(Event::NotificationClick(click)).await.unwrap();
        assert_eq!(outcome.effects, vec![Effect::FocusClient("b".into())]);
    }

    #[tokio::test]
    async fn test_click_opens_window_when_no_match() {
        let engine = engine().await;
        let click = NotificationClick {
            action: None,
            url: None,
            clients: vec![ClientInfo { id: "a".into(), url: "https://app.test/settings".into() }],
        };
        let outcome = engine.handle(Event::NotificationClick(click)).await.unwrap();
        assert_eq!(outcome.effects, vec![Effect::OpenWindow("https://app.test/".into())]);
    }
}
