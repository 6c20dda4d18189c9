//! # Command Handlers
//!
//! Handlers invoked by the command tables (see `application::router`).

pub mod admin;
pub mod help;
pub mod markers;
