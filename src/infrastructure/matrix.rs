//! # Matrix Service Adapter
//!
//! Implements the `ChatProvider` trait for the Matrix protocol using the `matrix_sdk`.
//! Destinations are room ids. Reactions are `m.annotation` relations and are
//! counted per key by reading the relations of the target event; deleting a
//! message redacts it.
//!
//! Inbound text messages are turned into [`ChatMessage`]s and handed out as a
//! stream, see [`MatrixService::inbound`].

use crate::domain::traits::ChatProvider;
use crate::domain::types::{ChatMessage, MessageHandle, ReactionCount};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use matrix_sdk::Client;
use matrix_sdk::room::{MessagesOptions, Room};
use matrix_sdk::ruma::api::client::relations::get_relating_events_with_rel_type;
use matrix_sdk::ruma::events::reaction::ReactionEventContent;
use matrix_sdk::ruma::events::relation::{Annotation, RelationType};
use matrix_sdk::ruma::events::room::member::{MembershipState, StrippedRoomMemberEvent};
use matrix_sdk::ruma::events::room::message::{
    MessageType, RoomMessageEventContent, SyncRoomMessageEvent,
};
use matrix_sdk::ruma::{EventId, OwnedEventId, RoomId, UInt};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

const REDACT_REASON: &str = "Room cleared by an admin";

#[derive(Clone)]
pub struct MatrixService {
    client: Client,
}

/// Fields of a timeline event the adapter looks at.
#[derive(Deserialize)]
struct EventStub {
    event_id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    unsigned: UnsignedStub,
}

#[derive(Deserialize, Default)]
struct UnsignedStub {
    #[serde(default)]
    redacted_because: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ReactionStub {
    sender: String,
    #[serde(default)]
    content: ReactionContentStub,
}

#[derive(Deserialize, Default)]
struct ReactionContentStub {
    #[serde(rename = "m.relates_to")]
    relates_to: Option<AnnotationStub>,
}

#[derive(Deserialize)]
struct AnnotationStub {
    #[serde(default)]
    rel_type: Option<String>,
    #[serde(default)]
    key: Option<String>,
}

/// Counts distinct senders per key, keys in order of first appearance.
fn count_reactions<'a>(events: impl Iterator<Item = &'a str>) -> Vec<ReactionCount> {
    let mut counts: Vec<ReactionCount> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for json in events {
        let Ok(stub) = serde_json::from_str::<ReactionStub>(json) else {
            continue;
        };
        let Some(AnnotationStub {
            rel_type: Some(rel_type),
            key: Some(key),
        }) = stub.content.relates_to
        else {
            continue;
        };
        if rel_type != "m.annotation" || !seen.insert((stub.sender, key.clone())) {
            continue;
        }
        match counts.iter_mut().find(|c| c.token == key) {
            Some(c) => c.count += 1,
            None => counts.push(ReactionCount {
                token: key,
                count: 1,
            }),
        }
    }
    counts
}

/// Whether a timeline event may be redacted by a room clear.
fn is_clearable(stub: &EventStub) -> bool {
    stub.state_key.is_none()
        && stub.unsigned.redacted_because.is_none()
        && stub.kind != "m.room.redaction"
}

impl MatrixService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn room(&self, destination: &str) -> Result<Room> {
        let room_id = RoomId::parse(destination)
            .with_context(|| format!("invalid room id {destination}"))?;
        self.client
            .get_room(&room_id)
            .ok_or_else(|| anyhow!("not joined to room {destination}"))
    }

    fn event_id(message: &MessageHandle) -> Result<OwnedEventId> {
        EventId::parse(message.as_str()).with_context(|| format!("invalid event id {message}"))
    }

    /// Registers handlers for text messages and invites and returns the
    /// stream of inbound messages. Own messages and anything sent before
    /// `since` are dropped.
    pub fn inbound(&self, since: SystemTime) -> UnboundedReceiverStream<ChatMessage> {
        let (tx, rx) = mpsc::unbounded_channel();

        self.client
            .add_event_handler(move |ev: SyncRoomMessageEvent, room: Room| {
                let tx = tx.clone();
                async move {
                    let Some(original) = ev.as_original() else {
                        return;
                    };
                    let ts = ev.origin_server_ts();
                    let event_time = UNIX_EPOCH + Duration::from_millis(ts.get().into());
                    if event_time < since {
                        return;
                    }
                    if original.sender == room.own_user_id() {
                        return;
                    }
                    let MessageType::Text(text) = &original.content.msgtype else {
                        return;
                    };

                    let author_name = match room.get_member_no_sync(&original.sender).await {
                        Ok(Some(member)) => member.name().to_string(),
                        _ => original.sender.localpart().to_string(),
                    };
                    tracing::info!(
                        "Received message from {} in {}: {}",
                        original.sender,
                        room.room_id(),
                        text.body
                    );

                    let message = ChatMessage {
                        author_id: original.sender.to_string(),
                        author_name,
                        channel: room.room_id().to_string(),
                        text: text.body.clone(),
                    };
                    if tx.send(message).is_err() {
                        tracing::debug!("Inbound stream closed, dropping message");
                    }
                }
            });

        self.client
            .add_event_handler(|ev: StrippedRoomMemberEvent, room: Room| async move {
                if ev.content.membership == MembershipState::Invite {
                    tracing::info!("Joining room {} on invite", room.room_id());
                    if let Err(e) = room.join().await {
                        tracing::warn!("Failed to join {}: {}", room.room_id(), e);
                    }
                }
            });

        UnboundedReceiverStream::new(rx)
    }
}

#[async_trait]
impl ChatProvider for MatrixService {
    async fn send_message(&self, destination: &str, content: &str) -> Result<MessageHandle> {
        tracing::info!("Bot sending message to {}: {}", destination, content);
        let room = self.room(destination)?;
        let resp = room
            .send(RoomMessageEventContent::text_markdown(content))
            .await?;
        Ok(MessageHandle(resp.event_id.to_string()))
    }

    async fn add_reaction(
        &self,
        destination: &str,
        message: &MessageHandle,
        token: &str,
    ) -> Result<()> {
        let room = self.room(destination)?;
        let annotation = Annotation::new(Self::event_id(message)?, token.to_string());
        room.send(ReactionEventContent::new(annotation)).await?;
        Ok(())
    }

    async fn fetch_reactions(
        &self,
        destination: &str,
        message: &MessageHandle,
    ) -> Result<Vec<ReactionCount>> {
        let room = self.room(destination)?;
        let request = get_relating_events_with_rel_type::v1::Request::new(
            room.room_id().to_owned(),
            Self::event_id(message)?,
            RelationType::Annotation,
        );
        let response = self.client.send(request).await?;
        // server returns newest first
        Ok(count_reactions(
            response.chunk.iter().rev().map(|raw| raw.json().get()),
        ))
    }

    async fn recent_messages(
        &self,
        destination: &str,
        limit: usize,
    ) -> Result<Vec<MessageHandle>> {
        let room = self.room(destination)?;
        let mut found = Vec::new();
        let mut from = None;

        loop {
            let mut options = MessagesOptions::backward();
            options.from = from.take();
            options.limit = UInt::from(limit.min(100) as u32);
            let page = room.messages(options).await?;

            for event in &page.chunk {
                let Ok(stub) = serde_json::from_str::<EventStub>(event.raw().json().get()) else {
                    continue;
                };
                if is_clearable(&stub) {
                    found.push(MessageHandle(stub.event_id));
                    if found.len() >= limit {
                        return Ok(found);
                    }
                }
            }

            match page.end {
                Some(end) if !page.chunk.is_empty() => from = Some(end),
                _ => return Ok(found),
            }
        }
    }

    async fn bulk_delete_messages(&self, destination: &str, ids: &[MessageHandle]) -> Result<()> {
        let room = self.room(destination)?;
        let mut failures = 0;
        for id in ids {
            let event_id = Self::event_id(id)?;
            if let Err(e) = room.redact(&event_id, Some(REDACT_REASON), None).await {
                tracing::warn!("Failed to redact {}: {}", id, e);
                failures += 1;
            }
        }
        if failures == ids.len() && !ids.is_empty() {
            anyhow::bail!("could not redact any of {} events in {}", ids.len(), destination);
        }
        Ok(())
    }

    async fn destination_name(&self, destination: &str) -> Result<String> {
        let room = self.room(destination)?;
        Ok(room.name().unwrap_or_else(|| destination.to_string()))
    }

    async fn set_topic(&self, destination: &str, topic: &str) -> Result<()> {
        self.room(destination)?.set_room_topic(topic).await?;
        Ok(())
    }
}
