//! # Admin Commands
//!
//! Server administration from the admin room: clearing a room, rebooting,
//! whitelist management and raw console passthrough. Destructive commands
//! go through a reaction vote first.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::application::confirm::ConfirmationWorkflow;
use crate::application::router::{CommandHandler, Invocation};
use crate::domain::traits::{ChatProvider, ConsoleInput, ConsoleTransport};
use crate::strings::messages;

const CLEAR_BATCH: usize = 100;

/// Where admin replies go and how to ask for confirmation.
#[derive(Clone)]
pub struct AdminContext {
    pub chat: Arc<dyn ChatProvider>,
    pub room: String,
    pub confirm: ConfirmationWorkflow,
}

impl AdminContext {
    async fn reply(&self, text: &str) {
        if let Err(e) = self.chat.send_message(&self.room, text).await {
            tracing::error!("Failed to reply in admin room: {:#}", e);
        }
    }

    /// Seconds a voter has before the confirmation gives up.
    fn vote_window_secs(&self) -> u64 {
        let s = self.confirm.settings();
        (s.interval * s.attempts).as_secs()
    }

    /// Runs `command` on the console and posts its output.
    async fn run_console(&self, console: &dyn ConsoleTransport, command: &str) {
        match console.execute(command).await {
            Ok(output) if output.trim().is_empty() => self.reply(messages::NO_OUTPUT).await,
            Ok(output) => self.reply(&output).await,
            Err(e) => {
                tracing::error!("Console command `{}` failed: {}", command, e);
                self.reply(&messages::command_failed(&e.to_string())).await
            }
        }
    }
}

/// `!clear-room <room-id>`: redacts every message of a room.
pub struct ClearRoom {
    ctx: AdminContext,
}

impl ClearRoom {
    pub fn new(ctx: AdminContext) -> Self {
        Self { ctx }
    }

    async fn clear(&self, room: &str) {
        let mut removed = 0;
        loop {
            let batch = match self.ctx.chat.recent_messages(room, CLEAR_BATCH).await {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!("Failed to read messages of {}: {:#}", room, e);
                    break;
                }
            };
            if let Err(e) = self.ctx.chat.bulk_delete_messages(room, &batch).await {
                tracing::error!("Bulk delete in {} failed: {:#}", room, e);
                break;
            }
            removed += batch.len();
        }
        tracing::info!("Cleared {} messages from {}", removed, room);
        self.ctx.reply(messages::DONE).await;
    }
}

#[async_trait]
impl CommandHandler for ClearRoom {
    async fn handle(&self, invocation: &Invocation<'_>) -> Result<()> {
        let room = invocation.args();
        let name = match self.ctx.chat.destination_name(room).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Room lookup for {} failed: {:#}", room, e);
                self.ctx.reply(&messages::channel_not_found(room)).await;
                return Ok(());
            }
        };

        let question = messages::clear_room_question(&name, self.ctx.vote_window_secs());
        self.ctx
            .confirm
            .confirm_generic(&question, self.clear(room))
            .await?;
        Ok(())
    }
}

/// `!reboot-server`: writes `stop` to the server; the container supervisor restarts it.
pub struct Reboot {
    ctx: AdminContext,
    input: Arc<dyn ConsoleInput>,
}

impl Reboot {
    pub fn new(ctx: AdminContext, input: Arc<dyn ConsoleInput>) -> Self {
        Self { ctx, input }
    }
}

#[async_trait]
impl CommandHandler for Reboot {
    async fn handle(&self, _invocation: &Invocation<'_>) -> Result<()> {
        let question = messages::reboot_question(self.ctx.vote_window_secs());
        self.ctx
            .confirm
            .confirm_generic(&question, async {
                tracing::info!("Reboot approved, stopping server");
                if let Err(e) = self.input.write("stop").await {
                    tracing::error!("Failed to send stop: {}", e);
                    self.ctx.reply(&messages::command_failed(&e.to_string())).await;
                }
            })
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitelistAction {
    Add,
    Remove,
    List,
}

impl WhitelistAction {
    fn verb(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::List => "list",
        }
    }
}

/// `!whitelist-add|remove <username>` and `!whitelist-list`.
pub struct Whitelist {
    ctx: AdminContext,
    console: Arc<dyn ConsoleTransport>,
    action: WhitelistAction,
    gated: bool,
}

impl Whitelist {
    pub fn new(
        ctx: AdminContext,
        console: Arc<dyn ConsoleTransport>,
        action: WhitelistAction,
        gated: bool,
    ) -> Self {
        Self {
            ctx,
            console,
            action,
            gated,
        }
    }
}

#[async_trait]
impl CommandHandler for Whitelist {
    async fn handle(&self, invocation: &Invocation<'_>) -> Result<()> {
        if self.action == WhitelistAction::List {
            self.ctx.run_console(self.console.as_ref(), "whitelist list").await;
            return Ok(());
        }

        let user = invocation.args();
        if user.is_empty() || user.contains(char::is_whitespace) {
            self.ctx
                .reply(&messages::usage(invocation.prefix, "<username>"))
                .await;
            return Ok(());
        }

        let command = format!("whitelist {} {}", self.action.verb(), user);
        if self.gated {
            let question =
                messages::whitelist_question(self.action.verb(), user, self.ctx.vote_window_secs());
            self.ctx
                .confirm
                .confirm_generic(&question, self.ctx.run_console(self.console.as_ref(), &command))
                .await?;
        } else {
            self.ctx.run_console(self.console.as_ref(), &command).await;
        }
        Ok(())
    }
}

/// `!console <command>`: raw passthrough, always confirmed.
pub struct ConsolePassthrough {
    ctx: AdminContext,
    console: Arc<dyn ConsoleTransport>,
}

impl ConsolePassthrough {
    pub fn new(ctx: AdminContext, console: Arc<dyn ConsoleTransport>) -> Self {
        Self { ctx, console }
    }
}

#[async_trait]
impl CommandHandler for ConsolePassthrough {
    async fn handle(&self, invocation: &Invocation<'_>) -> Result<()> {
        let command = invocation.args();
        if command.is_empty() {
            self.ctx
                .reply(&messages::usage(invocation.prefix, "<command>"))
                .await;
            return Ok(());
        }
        self.ctx
            .confirm
            .confirm_generic(
                &messages::console_question(command),
                self.ctx.run_console(self.console.as_ref(), command),
            )
            .await?;
        Ok(())
    }
}
