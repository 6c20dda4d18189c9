//! # Strings Module
//!
//! Centralizes user-facing strings, help text and log templates.

pub mod help;
pub mod logs;
pub mod messages;
