//! In-memory collaborators for unit tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::domain::error::BridgeError;
use crate::domain::traits::{ChatProvider, ConsoleInput, ConsoleTransport, ContainerRuntime};
use crate::domain::types::{
    ContainerHandle, ContainerState, Connection, MessageHandle, ReactionCount,
};

/// Records everything sent and serves scripted reaction polls.
#[derive(Default)]
pub struct FakeChat {
    pub sent: Mutex<Vec<(String, String)>>,
    pub reactions: Mutex<Vec<(String, MessageHandle, String)>>,
    /// Served one per `fetch_reactions` call; afterwards only the bot's own reactions show.
    pub polls: Mutex<VecDeque<Result<Vec<ReactionCount>, String>>>,
    pub fetches: Mutex<usize>,
    pub rooms: Mutex<HashMap<String, (String, Vec<MessageHandle>)>>,
    pub deleted: Mutex<Vec<MessageHandle>>,
    pub topics: Mutex<Vec<(String, String)>>,
}

impl FakeChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room(self, id: &str, name: &str, messages: usize) -> Self {
        let handles = (0..messages)
            .map(|i| MessageHandle(format!("{id}/msg{i}")))
            .collect();
        self.rooms
            .lock()
            .unwrap()
            .insert(id.to_string(), (name.to_string(), handles));
        self
    }

    pub fn push_poll(&self, counts: &[(&str, usize)]) {
        self.polls.lock().unwrap().push_back(Ok(counts
            .iter()
            .map(|(t, c)| ReactionCount {
                token: t.to_string(),
                count: *c,
            })
            .collect()));
    }

    pub fn push_poll_error(&self, err: &str) {
        self.polls.lock().unwrap().push_back(Err(err.to_string()));
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl ChatProvider for FakeChat {
    async fn send_message(&self, destination: &str, content: &str) -> Result<MessageHandle> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((destination.to_string(), content.to_string()));
        Ok(MessageHandle(format!("$event{}", sent.len())))
    }

    async fn add_reaction(
        &self,
        destination: &str,
        message: &MessageHandle,
        token: &str,
    ) -> Result<()> {
        self.reactions.lock().unwrap().push((
            destination.to_string(),
            message.clone(),
            token.to_string(),
        ));
        Ok(())
    }

    async fn fetch_reactions(
        &self,
        _destination: &str,
        message: &MessageHandle,
    ) -> Result<Vec<ReactionCount>> {
        *self.fetches.lock().unwrap() += 1;
        if let Some(next) = self.polls.lock().unwrap().pop_front() {
            return next.map_err(|e| anyhow!(e));
        }
        Ok(self
            .reactions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m, _)| m == message)
            .map(|(_, _, token)| ReactionCount {
                token: token.clone(),
                count: 1,
            })
            .collect())
    }

    async fn recent_messages(
        &self,
        destination: &str,
        limit: usize,
    ) -> Result<Vec<MessageHandle>> {
        let rooms = self.rooms.lock().unwrap();
        let (_, messages) = rooms
            .get(destination)
            .ok_or_else(|| anyhow!("unknown room {destination}"))?;
        Ok(messages.iter().take(limit).cloned().collect())
    }

    async fn bulk_delete_messages(&self, destination: &str, ids: &[MessageHandle]) -> Result<()> {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some((_, messages)) = rooms.get_mut(destination) {
            messages.retain(|m| !ids.contains(m));
        }
        self.deleted.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }

    async fn destination_name(&self, destination: &str) -> Result<String> {
        self.rooms
            .lock()
            .unwrap()
            .get(destination)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| anyhow!("unknown room {destination}"))
    }

    async fn set_topic(&self, destination: &str, topic: &str) -> Result<()> {
        self.topics
            .lock()
            .unwrap()
            .push((destination.to_string(), topic.to_string()));
        Ok(())
    }
}

/// Container runtime whose exec channels replay canned output.
#[derive(Default)]
pub struct FakeRuntime {
    pub exec_output: Mutex<Vec<u8>>,
    pub fail_exec: bool,
    pub broken_writer: bool,
    pub execs: Mutex<Vec<Vec<String>>>,
    pub state: Mutex<Option<ContainerState>>,
}

impl FakeRuntime {
    pub fn with_output(output: Vec<u8>) -> Self {
        Self {
            exec_output: Mutex::new(output),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn find_by_label(&self, label: &str) -> Result<ContainerHandle, BridgeError> {
        Ok(ContainerHandle {
            id: format!("container-{label}"),
        })
    }

    async fn attach(&self, _container: &ContainerHandle) -> Result<Connection, BridgeError> {
        Ok(Connection::new(
            Box::new(tokio::io::empty()),
            Box::new(tokio::io::sink()),
        ))
    }

    async fn exec(
        &self,
        _container: &ContainerHandle,
        argv: &[String],
    ) -> Result<Connection, BridgeError> {
        self.execs.lock().unwrap().push(argv.to_vec());
        if self.fail_exec {
            return Err(BridgeError::exec("create", "no such container"));
        }
        let output = self.exec_output.lock().unwrap().clone();
        let writer: Box<dyn tokio::io::AsyncWrite + Send + Unpin> = if self.broken_writer {
            Box::new(BrokenWriter)
        } else {
            Box::new(tokio::io::sink())
        };
        Ok(Connection::new(Box::new(std::io::Cursor::new(output)), writer))
    }

    async fn inspect(&self, _container: &ContainerHandle) -> Result<ContainerState, BridgeError> {
        self.state
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BridgeError::NotRunning("fake".into()))
    }
}

/// Accepts writes but fails to shut down, like a peer that already hung up.
pub struct BrokenWriter;

impl tokio::io::AsyncWrite for BrokenWriter {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
    }
}

/// Console that answers from a script and remembers every command.
#[derive(Default)]
pub struct FakeConsole {
    pub commands: Mutex<Vec<String>>,
    pub replies: Mutex<VecDeque<Result<String, String>>>,
}

impl FakeConsole {
    pub fn reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConsoleTransport for FakeConsole {
    async fn execute(&self, command: &str) -> Result<String, BridgeError> {
        self.commands.lock().unwrap().push(command.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(BridgeError::exec("attach", e)),
            None => Ok(String::new()),
        }
    }
}

/// Captures lines written to the server's stdin.
#[derive(Default)]
pub struct FakeInput {
    pub lines: Mutex<Vec<String>>,
}

#[async_trait]
impl ConsoleInput for FakeInput {
    async fn write(&self, text: &str) -> Result<(), BridgeError> {
        self.lines.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
