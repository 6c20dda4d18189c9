//! # Bridge Errors
//!
//! Typed failures of the bridge engine. Application code wraps these in
//! `anyhow::Error`; the stream session and executors return them directly so
//! callers can tell a dead server apart from a broken socket.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Read or write failure on a container connection.
    #[error("transport error during {stage}: {source}")]
    Transport {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// No output for longer than the inactivity timeout and the liveness check failed.
    #[error("no activity for {idle:?} and the server is not alive, restart required")]
    ProcessDead { idle: Duration },

    /// Accumulated exec output was too short to carry a frame header.
    #[error("frame of {len} bytes is too short to decode (need at least {min})")]
    Decode { len: usize, min: usize },

    /// Exec channel creation or attach failed.
    #[error("exec channel {stage} failed: {message}")]
    Exec { stage: &'static str, message: String },

    #[error("no container found with label {0}")]
    NotFound(String),

    #[error("{count} containers found with label {label}, expected exactly one")]
    MultipleFound { label: String, count: usize },

    #[error("container {0} is not running")]
    NotRunning(String),

    /// Remote console protocol failure (bad auth, malformed packet, ...).
    #[error("remote console: {0}")]
    Console(String),
}

impl BridgeError {
    pub fn transport(stage: &'static str, source: std::io::Error) -> Self {
        Self::Transport { stage, source }
    }

    pub fn exec(stage: &'static str, message: impl ToString) -> Self {
        Self::Exec {
            stage,
            message: message.to_string(),
        }
    }
}
