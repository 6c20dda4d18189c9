//! # Chat Relay
//!
//! Both directions of the in-game chat bridge:
//! server lines are classified and posted to the chat room, and chat room
//! messages are written to the server console as `tellraw` commands.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::classifier::classify;
use super::session::LineConsumer;
use crate::domain::traits::{ChatProvider, ConsoleInput};
use crate::domain::types::{ChatMessage, ServerEvent};
use crate::strings::messages;

/// Chat text for an event, `None` for lines that are not relayed.
pub fn render(event: &ServerEvent) -> Option<String> {
    match event {
        ServerEvent::Chat { user, text } => Some(messages::relay_chat(user, text)),
        ServerEvent::Join { user } => Some(messages::relay_join(user)),
        ServerEvent::Leave { user } => Some(messages::relay_leave(user)),
        ServerEvent::Advancement { user, name } => Some(messages::relay_advancement(user, name)),
        ServerEvent::Challenge { user, name } => Some(messages::relay_challenge(user, name)),
        ServerEvent::Emote { user, action } => Some(messages::relay_emote(user, action)),
        ServerEvent::Death { user, cause } => Some(messages::relay_death(user, cause)),
        ServerEvent::Unrecognized { .. } => None,
    }
}

/// Posts recognised server events to the chat room.
pub struct ServerToChat {
    chat: Arc<dyn ChatProvider>,
    room: String,
}

impl ServerToChat {
    pub fn new(chat: Arc<dyn ChatProvider>, room: impl Into<String>) -> Self {
        Self {
            chat,
            room: room.into(),
        }
    }
}

#[async_trait]
impl LineConsumer for ServerToChat {
    async fn consume(&self, line: &str) -> Result<()> {
        let event = classify(line);
        let Some(text) = render(&event) else {
            return Ok(());
        };

        let handle = self.chat.send_message(&self.room, &text).await?;
        if let ServerEvent::Death { .. } = event {
            self.chat
                .add_reaction(&self.room, &handle, messages::DEATH_REACTION)
                .await?;
        }
        Ok(())
    }
}

/// Mirrors every server line into the log.
pub struct ServerLog;

#[async_trait]
impl LineConsumer for ServerLog {
    async fn consume(&self, line: &str) -> Result<()> {
        tracing::debug!(target: "server", "{}", line);
        Ok(())
    }
}

/// `tellraw @a` command showing `<[m]author> text` to every player.
/// Author and text are JSON-escaped, so the command stays on one line.
pub fn tellraw(author: &str, text: &str) -> String {
    let components = json!([
        { "text": "<" },
        {
            "text": "[m]",
            "bold": true,
            "color": "dark_purple",
            "hoverEvent": {
                "action": "show_text",
                "value": ["", { "text": "Message From Matrix" }]
            }
        },
        { "text": format!("{}> {}", author, text) }
    ]);
    format!("tellraw @a {}", components)
}

/// Forwards chat room messages to the server.
pub struct ChatToServer {
    input: Arc<dyn ConsoleInput>,
}

impl ChatToServer {
    pub fn new(input: Arc<dyn ConsoleInput>) -> Self {
        Self { input }
    }

    pub async fn relay(&self, message: &ChatMessage) -> Result<()> {
        self.input
            .write(&tellraw(&message.author_name, &message.text))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::MessageHandle;
    use crate::testing::{FakeChat, FakeInput};

    const ROOM: &str = "!chat:example.org";

    #[tokio::test]
    async fn test_chat_line_posted() {
        let chat = Arc::new(FakeChat::new());
        let relay = ServerToChat::new(chat.clone(), ROOM);
        relay
            .consume("[22:22:34] [Server thread/INFO]: <Ann> hi")
            .await
            .unwrap();
        assert_eq!(chat.texts(), vec!["Ann » hi"]);
        assert!(chat.reactions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_death_gets_reaction() {
        let chat = Arc::new(FakeChat::new());
        let relay = ServerToChat::new(chat.clone(), ROOM);
        relay
            .consume("[23:22:56] [Server thread/INFO]: Ann fell out of the world")
            .await
            .unwrap();

        assert_eq!(chat.texts(), vec!["💀 Ann fell out of the world"]);
        let reactions = chat.reactions.lock().unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].1, MessageHandle("$event1".into()));
        assert_eq!(reactions[0].2, "🇫");
    }

    #[tokio::test]
    async fn test_unrecognized_lines_ignored() {
        let chat = Arc::new(FakeChat::new());
        let relay = ServerToChat::new(chat.clone(), ROOM);
        relay
            .consume("[10:00:00] [Server thread/INFO]: Done (3.2s)!")
            .await
            .unwrap();
        assert!(chat.texts().is_empty());
    }

    #[test]
    fn test_render_formats() {
        assert_eq!(
            render(&ServerEvent::Emote {
                user: "Ann".into(),
                action: "waves".into()
            })
            .as_deref(),
            Some("*\\* Ann waves*")
        );
        assert_eq!(
            render(&ServerEvent::Join { user: "Ann".into() }).as_deref(),
            Some("➡️ Ann joined")
        );
    }

    #[test]
    fn test_tellraw_escapes_payload() {
        let cmd = tellraw("Ann \"the\" Great", "line one\nline \\ two");
        assert!(cmd.starts_with("tellraw @a ["));
        assert!(!cmd.contains('\n'));

        let value: serde_json::Value =
            serde_json::from_str(cmd.trim_start_matches("tellraw @a ")).unwrap();
        assert_eq!(value[2]["text"], "Ann \"the\" Great> line one\nline \\ two");
        assert_eq!(value[1]["text"], "[m]");
    }

    #[tokio::test]
    async fn test_chat_to_server_writes_tellraw() {
        let input = Arc::new(FakeInput::default());
        let relay = ChatToServer::new(input.clone());
        relay
            .relay(&ChatMessage {
                author_id: "@ann:example.org".into(),
                author_name: "Ann".into(),
                channel: ROOM.into(),
                text: "hello".into(),
            })
            .await
            .unwrap();

        let lines = input.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], tellraw("Ann", "hello"));
    }
}
