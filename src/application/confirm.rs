//! # Confirmation Workflow
//!
//! Reaction based vote gating destructive commands.
//!
//! The question is posted with an affirm and a deny reaction already attached
//! by the bot, so a token reaches quorum (2 by default) as soon as one human
//! adds the same reaction. The message is polled a bounded number of times;
//! running out of attempts, or failing to refresh the message, gives up.

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::config::ConfirmationConfig;
use crate::domain::traits::ChatProvider;
use crate::domain::types::MessageHandle;
use crate::strings::messages;

#[derive(Debug, Clone)]
pub struct ConfirmSettings {
    pub affirm: String,
    pub deny: String,
    pub quorum: usize,
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ConfirmSettings {
    fn default() -> Self {
        Self::from(&ConfirmationConfig::default())
    }
}

impl From<&ConfirmationConfig> for ConfirmSettings {
    fn from(c: &ConfirmationConfig) -> Self {
        Self {
            affirm: c.affirm.clone(),
            deny: c.deny.clone(),
            quorum: c.quorum,
            attempts: c.attempts,
            interval: Duration::from_millis(c.interval_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Approved,
    Denied,
    TimedOut,
}

/// A question waiting for its quorum.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub question: String,
    pub message: MessageHandle,
    pub affirm: String,
    pub deny: String,
    pub quorum: usize,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PendingConfirmation {
    /// Polls the message until a token reaches quorum or attempts run out.
    pub async fn resolve(&self, chat: &dyn ChatProvider, destination: &str) -> ConfirmationOutcome {
        for attempt in 1..=self.max_attempts {
            let reactions = match chat.fetch_reactions(destination, &self.message).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("Failed to refresh confirmation message: {:#}", e);
                    break;
                }
            };

            for reaction in reactions.iter().filter(|r| r.count >= self.quorum) {
                if reaction.token == self.affirm {
                    tracing::info!("Confirmed after {} polls: {}", attempt, self.question);
                    return ConfirmationOutcome::Approved;
                }
                if reaction.token == self.deny {
                    tracing::info!("Denied after {} polls: {}", attempt, self.question);
                    return ConfirmationOutcome::Denied;
                }
            }

            sleep(self.interval).await;
        }

        tracing::info!("Gave up waiting for confirmation: {}", self.question);
        ConfirmationOutcome::TimedOut
    }
}

#[derive(Clone)]
pub struct ConfirmationWorkflow {
    chat: Arc<dyn ChatProvider>,
    destination: String,
    settings: ConfirmSettings,
}

impl ConfirmationWorkflow {
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        destination: impl Into<String>,
        settings: ConfirmSettings,
    ) -> Self {
        Self {
            chat,
            destination: destination.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &ConfirmSettings {
        &self.settings
    }

    /// Posts `question` and waits for the vote.
    /// Only failing to post the question is an error.
    pub async fn ask(&self, question: &str) -> Result<ConfirmationOutcome> {
        let message = self.chat.send_message(&self.destination, question).await?;
        for token in [&self.settings.affirm, &self.settings.deny] {
            if let Err(e) = self
                .chat
                .add_reaction(&self.destination, &message, token)
                .await
            {
                tracing::warn!("Failed to add {} to confirmation: {:#}", token, e);
            }
        }

        let pending = PendingConfirmation {
            question: question.to_string(),
            message,
            affirm: self.settings.affirm.clone(),
            deny: self.settings.deny.clone(),
            quorum: self.settings.quorum,
            interval: self.settings.interval,
            max_attempts: self.settings.attempts,
        };
        Ok(pending.resolve(self.chat.as_ref(), &self.destination).await)
    }

    /// Asks and runs exactly one of the three continuations.
    pub async fn confirm<A, D, T>(
        &self,
        question: &str,
        on_approve: A,
        on_deny: D,
        on_timeout: T,
    ) -> Result<ConfirmationOutcome>
    where
        A: Future<Output = ()>,
        D: Future<Output = ()>,
        T: Future<Output = ()>,
    {
        let outcome = self.ask(question).await?;
        match outcome {
            ConfirmationOutcome::Approved => on_approve.await,
            ConfirmationOutcome::Denied => on_deny.await,
            ConfirmationOutcome::TimedOut => on_timeout.await,
        }
        Ok(outcome)
    }

    /// [`confirm`](Self::confirm) with the stock refusal and give-up replies.
    pub async fn confirm_generic<A>(&self, question: &str, on_approve: A) -> Result<ConfirmationOutcome>
    where
        A: Future<Output = ()>,
    {
        self.confirm(
            question,
            on_approve,
            self.notify(messages::CONFIRM_DENIED),
            self.notify(messages::CONFIRM_GAVE_UP),
        )
        .await
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.chat.send_message(&self.destination, text).await {
            tracing::error!("Failed to send confirmation reply: {:#}", e);
        }
    }
}
