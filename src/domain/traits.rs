//! # Domain Traits
//!
//! Abstract interfaces for the bridge's external collaborators (chat platform,
//! container runtime, console transport, marker storage).
//! Allows for pluggable implementations in the Infrastructure layer.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::error::BridgeError;
use crate::domain::types::{
    ContainerHandle, ContainerState, Connection, MessageHandle, ReactionCount,
};

/// Abstract interface for a Chat Provider (e.g., Matrix).
/// Destinations are platform room/channel identifiers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a message and return its identity
    async fn send_message(&self, destination: &str, content: &str) -> Result<MessageHandle>;

    /// React to a message with the given token (emoji key)
    async fn add_reaction(
        &self,
        destination: &str,
        message: &MessageHandle,
        token: &str,
    ) -> Result<()>;

    /// Current reaction state of a message, aggregated per token
    async fn fetch_reactions(
        &self,
        destination: &str,
        message: &MessageHandle,
    ) -> Result<Vec<ReactionCount>>;

    /// Most recent, not yet deleted, messages of a destination (newest first)
    async fn recent_messages(&self, destination: &str, limit: usize)
    -> Result<Vec<MessageHandle>>;

    async fn bulk_delete_messages(&self, destination: &str, ids: &[MessageHandle]) -> Result<()>;

    /// Display name of a destination; errors when the destination is unknown
    async fn destination_name(&self, destination: &str) -> Result<String>;

    async fn set_topic(&self, destination: &str, topic: &str) -> Result<()>;
}

/// Container runtime primitives needed to reach the game server process.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn find_by_label(&self, label: &str) -> Result<ContainerHandle, BridgeError>;

    /// Attach to the main process' stdin/stdout/stderr.
    async fn attach(&self, container: &ContainerHandle) -> Result<Connection, BridgeError>;

    /// Create a one-off exec of `argv` and attach to its output.
    async fn exec(
        &self,
        container: &ContainerHandle,
        argv: &[String],
    ) -> Result<Connection, BridgeError>;

    async fn inspect(&self, container: &ContainerHandle) -> Result<ContainerState, BridgeError>;
}

/// Runs one console command against the server and returns its textual output.
#[async_trait]
pub trait ConsoleTransport: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String, BridgeError>;
}

/// Writes raw lines into the attached server's stdin.
#[async_trait]
pub trait ConsoleInput: Send + Sync {
    async fn write(&self, text: &str) -> Result<(), BridgeError>;
}

/// Read access to persisted map markers.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Markers whose identifier belongs to `owner`.
    async fn list(&self, owner: &str) -> Result<Vec<crate::domain::types::Marker>>;
}

/// Reports how many players are connected to the game server.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn online_players(&self) -> Result<u32>;
}
