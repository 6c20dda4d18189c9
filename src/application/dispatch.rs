//! # Message Dispatcher
//!
//! Decides what an inbound chat message is for, based on the room it arrived in:
//! admin commands, marker commands, or in-game chat.

use futures::{Stream, StreamExt};
use std::sync::Arc;

use super::relay::ChatToServer;
use super::router::CommandTable;
use crate::domain::traits::ChatProvider;
use crate::domain::types::ChatMessage;
use crate::strings::messages;

pub struct Rooms {
    pub chat: String,
    pub admin: String,
    pub markers: Option<String>,
}

pub struct Dispatcher {
    rooms: Rooms,
    admins: Vec<String>,
    chat: Arc<dyn ChatProvider>,
    relay: ChatToServer,
    admin: CommandTable,
    markers: Option<CommandTable>,
}

impl Dispatcher {
    pub fn new(
        rooms: Rooms,
        admins: Vec<String>,
        chat: Arc<dyn ChatProvider>,
        relay: ChatToServer,
        admin: CommandTable,
        markers: Option<CommandTable>,
    ) -> Self {
        Self {
            rooms,
            admins,
            chat,
            relay,
            admin,
            markers,
        }
    }

    fn is_admin(&self, author_id: &str) -> bool {
        self.admins.is_empty()
            || self
                .admins
                .iter()
                .any(|a| a.eq_ignore_ascii_case(author_id))
    }

    /// Handles one inbound message to completion.
    pub async fn dispatch(&self, message: &ChatMessage) {
        let mut handled = 0;

        if message.channel == self.rooms.admin {
            let addressed = self.admin.prefixes().any(|p| message.text.starts_with(p));
            if addressed && !self.is_admin(&message.author_id) {
                tracing::warn!("Rejected admin command from {}", message.author_id);
                if let Err(e) = self.chat.send_message(&message.channel, messages::AUTH_DENIED).await {
                    tracing::error!("Failed to send denial: {:#}", e);
                }
                return;
            }
            handled += self.admin.route(message).await;
        }

        if let (Some(room), Some(table)) = (&self.rooms.markers, &self.markers)
            && message.channel == *room
        {
            handled += table.route(message).await;
        }

        if message.channel == self.rooms.chat && handled == 0 {
            if let Err(e) = self.relay.relay(message).await {
                tracing::error!("Failed to relay message to server: {:#}", e);
            }
        }
    }

    /// Consumes the inbound stream, one task per message, until it ends.
    pub async fn run<S>(self: Arc<Self>, mut inbound: S)
    where
        S: Stream<Item = ChatMessage> + Unpin,
    {
        while let Some(message) = inbound.next().await {
            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.dispatch(&message).await;
            });
        }
        tracing::info!("Inbound chat stream ended");
    }
}
