//! # Marker Commands
//!
//! `!marker-add`, `!markers` and `!marker-remove` for the markers room.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;

use crate::application::markers::{AddOutcome, MarkerService, RemoveOutcome};
use crate::application::router::{CommandHandler, Invocation};
use crate::domain::traits::ChatProvider;
use crate::domain::types::Marker;
use crate::strings::messages;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAction {
    Add,
    List,
    Remove,
}

pub struct MarkerCommand {
    service: Arc<MarkerService>,
    chat: Arc<dyn ChatProvider>,
    room: String,
    action: MarkerAction,
}

impl MarkerCommand {
    pub fn new(
        service: Arc<MarkerService>,
        chat: Arc<dyn ChatProvider>,
        room: impl Into<String>,
        action: MarkerAction,
    ) -> Self {
        Self {
            service,
            chat,
            room: room.into(),
            action,
        }
    }

    async fn reply(&self, text: &str) -> Result<()> {
        self.chat.send_message(&self.room, text).await.map(|_| ())
    }

    async fn run(&self, author: &str, args: &str) -> Result<String> {
        Ok(match self.action {
            MarkerAction::Add => match self.service.add(author, args).await? {
                AddOutcome::Added(_) => messages::MARKER_ADDED.to_string(),
                AddOutcome::Malformed => messages::BAD_COORDINATES.to_string(),
                AddOutcome::LimitReached(n) => messages::too_many_markers(n),
                AddOutcome::Rejected(_) => messages::MARKER_ADD_FAILED.to_string(),
            },
            MarkerAction::List => format_list(&self.service.list(author).await?),
            MarkerAction::Remove => match self.service.remove(author, args).await? {
                RemoveOutcome::Removed => messages::MARKER_REMOVED.to_string(),
                RemoveOutcome::Unknown => messages::no_marker_named(args),
                RemoveOutcome::Rejected(_) => messages::MARKER_REMOVE_FAILED.to_string(),
            },
        })
    }
}

pub fn format_list(markers: &[Marker]) -> String {
    if markers.is_empty() {
        return messages::NO_MARKERS.to_string();
    }
    let mut out = String::from(messages::MARKERS_HEADER);
    for m in markers {
        let _ = write!(out, "\n- **{}**: {:.1} {:.1} ({})", m.name, m.x, m.z, m.dimension);
    }
    out
}

#[async_trait]
impl CommandHandler for MarkerCommand {
    async fn handle(&self, invocation: &Invocation<'_>) -> Result<()> {
        let text = match self
            .run(&invocation.message.author_id, invocation.args())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Marker command {} failed: {:#}", invocation.prefix, e);
                messages::MARKERS_UNAVAILABLE.to_string()
            }
        };
        self.reply(&text).await
    }
}
