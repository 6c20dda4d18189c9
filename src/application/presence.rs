//! # Player Presence
//!
//! Keeps the chat room topic showing how many players are online.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::domain::traits::{ChatProvider, StatusSource};
use crate::strings::messages;

pub struct PresenceLoop {
    status: Arc<dyn StatusSource>,
    chat: Arc<dyn ChatProvider>,
    room: String,
    address: String,
    interval: Duration,
}

impl PresenceLoop {
    pub fn new(
        status: Arc<dyn StatusSource>,
        chat: Arc<dyn ChatProvider>,
        room: impl Into<String>,
        address: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            status,
            chat,
            room: room.into(),
            address: address.into(),
            interval,
        }
    }

    /// One status check and topic update. Returns the topic that was set.
    pub async fn refresh(&self) -> anyhow::Result<String> {
        self.refresh_if_changed(None).await
    }

    /// Refreshes every interval until cancelled. Failures are logged and retried.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        let mut last_topic = None;
        loop {
            if *cancel.borrow() {
                return;
            }
            match self.refresh_if_changed(last_topic.as_deref()).await {
                Ok(topic) => last_topic = Some(topic),
                Err(e) => tracing::warn!("Presence refresh failed: {:#}", e),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.changed() => {}
            }
        }
    }

    async fn refresh_if_changed(&self, last: Option<&str>) -> anyhow::Result<String> {
        let online = self.status.online_players().await?;
        let topic = messages::presence_topic(online, &self.address);
        if last != Some(topic.as_str()) {
            self.chat.set_topic(&self.room, &topic).await?;
            tracing::debug!("Room topic set to {}", topic);
        }
        Ok(topic)
    }
}
