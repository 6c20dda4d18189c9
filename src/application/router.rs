//! # Command Router
//!
//! Routes chat messages to command handlers by literal prefix.
//!
//! A [`CommandTable`] is assembled once at startup through [`CommandTableBuilder`]
//! and never changes afterwards. Routing is not exclusive: every entry whose
//! prefix starts the message runs, in registration order, so `!list` and
//! `!list-extended` both fire for `!list-extended x`.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::traits::ChatProvider;
use crate::domain::types::ChatMessage;
use crate::interface::commands::help::HelpCommand;

/// One matched command: the prefix that fired and the untouched message.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub prefix: &'a str,
    pub message: &'a ChatMessage,
}

impl<'a> Invocation<'a> {
    /// Message text after the matched prefix, trimmed.
    pub fn args(&self) -> &'a str {
        self.message
            .text
            .strip_prefix(self.prefix)
            .unwrap_or_default()
            .trim()
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, invocation: &Invocation<'_>) -> Result<()>;
}

pub struct CommandEntry {
    pub prefix: String,
    pub help: String,
    handler: Arc<dyn CommandHandler>,
}

pub struct CommandTable {
    name: String,
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    pub fn builder(name: impl Into<String>) -> CommandTableBuilder {
        CommandTableBuilder {
            name: name.into(),
            help: None,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.prefix.as_str())
    }

    /// `**prefix** help` for every entry, one per line.
    pub fn help_text(&self) -> String {
        render_help(self.entries.iter().map(|e| (e.prefix.as_str(), e.help.as_str())))
    }

    /// Runs every handler whose prefix starts `message.text`.
    /// Handler errors are logged and do not stop the remaining matches.
    /// Returns how many handlers ran.
    pub async fn route(&self, message: &ChatMessage) -> usize {
        let mut invoked = 0;
        for entry in self
            .entries
            .iter()
            .filter(|e| message.text.starts_with(e.prefix.as_str()))
        {
            let invocation = Invocation {
                prefix: &entry.prefix,
                message,
            };
            tracing::info!(
                table = %self.name,
                sender = %message.author_id,
                "Router dispatching cmd='{}' args='{}'",
                entry.prefix,
                invocation.args()
            );
            if let Err(e) = entry.handler.handle(&invocation).await {
                tracing::error!("Command {} failed: {:#}", entry.prefix, e);
            }
            invoked += 1;
        }
        invoked
    }
}

fn render_help<'a>(entries: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    entries
        .map(|(prefix, help)| format!("**{}** {}", prefix, help))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct CommandTableBuilder {
    name: String,
    help: Option<(String, String, Arc<dyn ChatProvider>, String)>,
    entries: Vec<CommandEntry>,
}

impl CommandTableBuilder {
    pub fn command(
        mut self,
        prefix: impl Into<String>,
        help: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        self.entries.push(CommandEntry {
            prefix: prefix.into(),
            help: help.into(),
            handler,
        });
        self
    }

    /// Adds a leading help entry that replies with the finished listing.
    pub fn with_help(
        mut self,
        prefix: impl Into<String>,
        help: impl Into<String>,
        chat: Arc<dyn ChatProvider>,
        destination: impl Into<String>,
    ) -> Self {
        self.help = Some((prefix.into(), help.into(), chat, destination.into()));
        self
    }

    pub fn build(self) -> CommandTable {
        let mut entries = self.entries;
        if let Some((prefix, help, chat, destination)) = self.help {
            let listing = render_help(
                std::iter::once((prefix.as_str(), help.as_str()))
                    .chain(entries.iter().map(|e| (e.prefix.as_str(), e.help.as_str()))),
            );
            entries.insert(
                0,
                CommandEntry {
                    handler: Arc::new(HelpCommand::new(chat, destination, listing)),
                    prefix,
                    help,
                },
            );
        }
        CommandTable {
            name: self.name,
            entries,
        }
    }
}
