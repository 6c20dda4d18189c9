//! # Domain Types
//!
//! Common data structures and enums used across the bridge.

use chrono::{DateTime, Utc};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// A typed event extracted from one line of server output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Chat { user: String, text: String },
    Join { user: String },
    Leave { user: String },
    Advancement { user: String, name: String },
    Challenge { user: String, name: String },
    Emote { user: String, action: String },
    Death { user: String, cause: String },
    Unrecognized { raw: String },
}

/// Identity of a message sent to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub String);

impl MessageHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregated count for one reaction key on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionCount {
    pub token: String,
    pub count: usize,
}

/// An inbound chat message, already stripped of platform specifics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Stable platform identity of the author (e.g. `@ann:example.org`).
    pub author_id: String,
    /// Human readable name, used when relaying into the game.
    pub author_name: String,
    /// Destination the message arrived in.
    pub channel: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
}

impl ContainerState {
    /// Running, and not restarted since `since`. A restart means the attach
    /// stream belongs to a process that is gone.
    pub fn is_alive_since(&self, since: DateTime<Utc>) -> bool {
        self.running && self.started_at.is_none_or(|started| started <= since)
    }
}

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A duplexed byte stream to a process inside the container.
pub struct Connection {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl Connection {
    pub fn new(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self { reader, writer }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Map dimension a marker lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Overworld,
    Nether,
    End,
}

impl Dimension {
    /// Name used in chat commands.
    pub fn from_alias(s: &str) -> Option<Self> {
        match s {
            "overworld" => Some(Self::Overworld),
            "nether" => Some(Self::Nether),
            "end" | "the_end" => Some(Self::End),
            _ => None,
        }
    }

    /// World folder name used by the map plugin.
    pub fn world(&self) -> &'static str {
        match self {
            Self::Overworld => "world",
            Self::Nether => "world_nether",
            Self::End => "world_the_end",
        }
    }

    pub fn from_world(world: &str) -> Option<Self> {
        match world {
            "world" => Some(Self::Overworld),
            "world_nether" => Some(Self::Nether),
            "world_the_end" => Some(Self::End),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Overworld => "overworld",
            Self::Nether => "nether",
            Self::End => "end",
        })
    }
}

/// A player owned point of interest on the web map.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: String,
    pub name: String,
    pub dimension: Dimension,
    pub x: f64,
    pub z: f64,
}
