//! # Stream Session
//!
//! Owns the long lived attach connection to the game server.
//!
//! - [`StreamSession::listen`] reads newline delimited output, fans every line
//!   out to the registered consumers and decides when the server is gone.
//! - [`ConsoleInput::write`] injects a line into the server's stdin. Writers are
//!   serialized so a relayed chat message never interleaves with an admin
//!   command.
//!
//! Consumer dispatch is a lossy multicast: a failing consumer stops delivery of
//! that one line to the consumers registered after it, nothing more.

use async_trait::async_trait;
use bytes::BytesMut;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::{Instant, sleep, timeout};

use crate::domain::error::BridgeError;
use crate::domain::traits::ConsoleInput;
use crate::domain::types::{BoxedReader, BoxedWriter, Connection};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives every line read from the server.
#[async_trait]
pub trait LineConsumer: Send + Sync {
    async fn consume(&self, line: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> LineConsumer for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    async fn consume(&self, line: &str) -> anyhow::Result<()> {
        self(line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Failed(String),
    /// An earlier consumer failed for this line.
    Skipped,
}

/// What happened to one line, per consumer, in dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<(String, DispatchOutcome)>,
}

impl DispatchReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(name, outcome)| match outcome {
            DispatchOutcome::Failed(e) => Some((name.as_str(), e.as_str())),
            _ => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Buffered newline splitter. Partial lines survive a cancelled read.
struct LineReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// `Ok(None)` means the peer closed and nothing is buffered.
    async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(i) = self.buf.iter().position(|b| *b == b'\n') {
                let raw = self.buf.split_to(i + 1);
                let line = raw.strip_suffix(b"\n").unwrap_or(&raw);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                return Ok(Some(String::from_utf8_lossy(line).into_owned()));
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // flush an unterminated tail once the peer is done
                let raw = self.buf.split();
                return Ok(Some(String::from_utf8_lossy(&raw).into_owned()));
            }
        }
    }
}

type ConsumerList = Vec<(String, Arc<dyn LineConsumer>)>;

pub struct StreamSession {
    reader: Mutex<LineReader<BoxedReader>>,
    writer: Mutex<BoxedWriter>,
    consumers: RwLock<ConsumerList>,
    read_timeout: Duration,
}

impl StreamSession {
    pub fn new(connection: Connection) -> Self {
        Self {
            reader: Mutex::new(LineReader::new(connection.reader)),
            writer: Mutex::new(connection.writer),
            consumers: RwLock::new(Vec::new()),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Bound on a single read attempt.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Registers `consumer` under `name`. A known name keeps its position and
    /// gets the new consumer.
    pub async fn register_consumer(&self, name: &str, consumer: Arc<dyn LineConsumer>) {
        let mut consumers = self.consumers.write().await;
        match consumers.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = consumer,
            None => consumers.push((name.to_string(), consumer)),
        }
    }

    pub async fn consumer_names(&self) -> Vec<String> {
        self.consumers
            .read()
            .await
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Delivers one line to every consumer in registration order.
    pub async fn dispatch(&self, line: &str) -> DispatchReport {
        let consumers: ConsumerList = self.consumers.read().await.clone();
        let mut report = DispatchReport::default();
        let mut failed = false;

        for (name, consumer) in consumers {
            if failed {
                report.outcomes.push((name, DispatchOutcome::Skipped));
                continue;
            }
            match consumer.consume(line).await {
                Ok(()) => report.outcomes.push((name, DispatchOutcome::Delivered)),
                Err(e) => {
                    failed = true;
                    report
                        .outcomes
                        .push((name, DispatchOutcome::Failed(format!("{e:#}"))));
                }
            }
        }
        report
    }

    /// Runs the read loop until cancelled or until the server is gone.
    ///
    /// Silence alone is never fatal: once `inactivity` has passed without a
    /// line, `is_alive` decides whether to keep waiting.
    pub async fn listen<F, Fut>(
        &self,
        inactivity: Duration,
        mut is_alive: F,
        cancel: watch::Receiver<bool>,
    ) -> Result<(), BridgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut reader = self.reader.lock().await;
        let mut last_activity = Instant::now();
        tracing::info!(
            "Listening to server output (inactivity timeout {:?})",
            inactivity
        );

        loop {
            if *cancel.borrow() {
                tracing::info!("Stream session cancelled");
                return Ok(());
            }

            match timeout(self.read_timeout, reader.read_line()).await {
                Ok(Ok(Some(line))) => {
                    last_activity = Instant::now();
                    let report = self.dispatch(&line).await;
                    for (name, err) in report.failures() {
                        tracing::warn!(consumer = name, "Consumer failed on line: {}", err);
                    }
                    continue;
                }
                Ok(Ok(None)) => {
                    // closed stream, wait out one read window instead of spinning
                    sleep(self.read_timeout).await;
                }
                Ok(Err(e)) => return Err(BridgeError::transport("read", e)),
                Err(_elapsed) => {}
            }

            let idle = last_activity.elapsed();
            if idle > inactivity {
                if !is_alive().await {
                    return Err(BridgeError::ProcessDead { idle });
                }
                tracing::debug!("Idle for {:?} but server is alive", idle);
            }
        }
    }
}

#[async_trait]
impl ConsoleInput for StreamSession {
    async fn write(&self, text: &str) -> Result<(), BridgeError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| BridgeError::transport("first newline", e))?;
        writer
            .write_all(text.as_bytes())
            .await
            .map_err(|e| BridgeError::transport("send message", e))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| BridgeError::transport("second newline", e))?;
        writer
            .flush()
            .await
            .map_err(|e| BridgeError::transport("flush", e))
    }
}
