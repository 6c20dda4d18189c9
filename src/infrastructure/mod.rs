//! # Infrastructure Layer
//!
//! Handles interactions with external systems and services.
//! Implements the traits defined in the Domain layer (e.g., ChatProvider, ContainerRuntime).

pub mod docker;
pub mod marker_store;
pub mod matrix;
pub mod rcon;
pub mod status_ping;
