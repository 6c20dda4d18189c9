//! # Help Command
//!
//! Replies with the command listing of the table it belongs to.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::application::router::{CommandHandler, Invocation};
use crate::domain::traits::ChatProvider;

pub struct HelpCommand {
    chat: Arc<dyn ChatProvider>,
    destination: String,
    listing: String,
}

impl HelpCommand {
    pub fn new(chat: Arc<dyn ChatProvider>, destination: String, listing: String) -> Self {
        Self {
            chat,
            destination,
            listing,
        }
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn handle(&self, _invocation: &Invocation<'_>) -> Result<()> {
        self.chat
            .send_message(&self.destination, &self.listing)
            .await
            .map(|_| ())
    }
}
