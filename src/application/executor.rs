//! # One-Shot Command Executor
//!
//! Runs a single console command through a fresh `exec` of the console CLI
//! inside the server container, then decodes the multiplexed output.
//! Every call opens its own channel, so it never contends with the attach
//! stream.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use super::frame;
use crate::domain::error::BridgeError;
use crate::domain::traits::{ConsoleTransport, ContainerRuntime};
use crate::domain::types::ContainerHandle;

pub struct ExecConsole {
    runtime: Arc<dyn ContainerRuntime>,
    container: ContainerHandle,
    tool: String,
    read_timeout: Duration,
}

impl ExecConsole {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        container: ContainerHandle,
        tool: impl Into<String>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            container,
            tool: tool.into(),
            read_timeout,
        }
    }
}

/// `tool` followed by the shell-lexed words of `command`.
/// Unbalanced quotes fall back to plain whitespace splitting.
pub fn build_argv(tool: &str, command: &str) -> Vec<String> {
    let words = shell_words::split(command).unwrap_or_else(|e| {
        tracing::warn!("Could not lex `{}` ({}), splitting on whitespace", command, e);
        command.split_whitespace().map(str::to_string).collect()
    });
    std::iter::once(tool.to_string()).chain(words).collect()
}

#[async_trait]
impl ConsoleTransport for ExecConsole {
    async fn execute(&self, command: &str) -> Result<String, BridgeError> {
        let argv = build_argv(&self.tool, command);
        tracing::info!("Executing console command: {:?}", argv);

        let mut conn = self.runtime.exec(&self.container, &argv).await.map_err(|e| {
            tracing::error!("Exec channel setup failed: {}", e);
            match e {
                BridgeError::Exec { .. } => e,
                other => BridgeError::exec("create", other),
            }
        })?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match timeout(self.read_timeout, conn.reader.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => {
                    tracing::debug!("Exec read ended with error: {}", e);
                    break;
                }
                Err(_) => {
                    tracing::debug!("Exec read deadline reached after {} bytes", buf.len());
                    break;
                }
            }
        }
        if let Err(e) = conn.writer.shutdown().await {
            tracing::debug!("Exec channel shutdown failed: {}", e);
        }

        frame::decode(&buf)
    }
}
