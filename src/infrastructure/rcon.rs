//! # Remote Console (RCON)
//!
//! Alternative console transport speaking the Source RCON protocol over TCP.
//!
//! Packet layout, all integers little-endian:
//! `[length i32][request id i32][type i32][body][0][0]`, where `length` counts
//! everything after itself. The connection is opened and authenticated lazily
//! and dropped after any failure, so the next command reconnects.
//!
//! Replies longer than one packet arrive as several response packets with the
//! command's id. Each command is followed by an empty response-type request;
//! the server answers it only after the command's last fragment, so its echo
//! marks the end of the reply.

use async_trait::async_trait;
use bytes::{Buf, BufMut, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::domain::error::BridgeError;
use crate::domain::traits::ConsoleTransport;

pub const TYPE_RESPONSE: i32 = 0;
pub const TYPE_COMMAND: i32 = 2;
pub const TYPE_AUTH_RESPONSE: i32 = 2;
pub const TYPE_AUTH: i32 = 3;

/// Largest packet the server may send.
const MAX_PACKET: usize = 4096 + 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn encode(&self) -> BytesMut {
        let body = self.body.as_bytes();
        let mut buf = BytesMut::with_capacity(body.len() + 14);
        buf.put_i32_le(body.len() as i32 + 10);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.kind);
        buf.put_slice(body);
        buf.put_u8(0);
        buf.put_u8(0);
        buf
    }

    /// Decodes the part after the length prefix.
    pub fn decode(mut payload: &[u8]) -> Result<Self, BridgeError> {
        if payload.len() < 10 {
            return Err(BridgeError::Console(format!(
                "packet of {} bytes is too short",
                payload.len()
            )));
        }
        let id = payload.get_i32_le();
        let kind = payload.get_i32_le();
        let body = &payload[..payload.len() - 2];
        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

/// One authenticated RCON connection.
pub struct RconConnection {
    stream: TcpStream,
    next_id: i32,
}

impl RconConnection {
    pub async fn connect(address: &str, password: &str) -> Result<Self, BridgeError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| BridgeError::transport("rcon connect", e))?;
        let mut conn = Self { stream, next_id: 1 };

        let id = conn.send(TYPE_AUTH, password).await?;
        loop {
            let reply = conn.receive().await?;
            if reply.kind != TYPE_AUTH_RESPONSE {
                continue;
            }
            if reply.id == -1 || reply.id != id {
                return Err(BridgeError::Console("authentication refused".into()));
            }
            break;
        }
        tracing::info!("Authenticated to remote console at {}", address);
        Ok(conn)
    }

    /// Writes one packet and returns its request id.
    pub async fn send(&mut self, kind: i32, body: &str) -> Result<i32, BridgeError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let packet = Packet {
            id,
            kind,
            body: body.to_string(),
        };
        self.stream
            .write_all(&packet.encode())
            .await
            .map_err(|e| BridgeError::transport("rcon write", e))?;
        Ok(id)
    }

    pub async fn receive(&mut self) -> Result<Packet, BridgeError> {
        let len = self
            .stream
            .read_i32_le()
            .await
            .map_err(|e| BridgeError::transport("rcon read", e))?;
        let len = usize::try_from(len)
            .ok()
            .filter(|l| (10..=MAX_PACKET).contains(l))
            .ok_or_else(|| BridgeError::Console(format!("invalid packet length {len}")))?;

        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| BridgeError::transport("rcon read", e))?;
        Packet::decode(&payload)
    }
}

/// `ConsoleTransport` over a lazily (re)connected RCON session.
pub struct RconConsole {
    address: String,
    password: String,
    timeout: Duration,
    conn: Mutex<Option<RconConnection>>,
}

impl RconConsole {
    pub fn new(address: impl Into<String>, password: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            timeout,
            conn: Mutex::new(None),
        }
    }

    async fn run(&self, slot: &mut Option<RconConnection>, command: &str) -> Result<String, BridgeError> {
        if slot.is_none() {
            *slot = Some(RconConnection::connect(&self.address, &self.password).await?);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(BridgeError::Console("not connected".into()));
        };

        let id = conn.send(TYPE_COMMAND, command).await?;
        let end = conn.send(TYPE_RESPONSE, "").await?;
        let mut body = String::new();
        loop {
            let reply = conn.receive().await?;
            if reply.id == end {
                return Ok(body);
            }
            if reply.id == id && reply.kind == TYPE_RESPONSE {
                body.push_str(&reply.body);
                continue;
            }
            tracing::debug!("Skipping unexpected rcon packet {:?}", reply);
        }
    }
}

#[async_trait]
impl ConsoleTransport for RconConsole {
    async fn execute(&self, command: &str) -> Result<String, BridgeError> {
        tracing::info!("Executing console command over rcon: {}", command);
        let mut slot = self.conn.lock().await;
        let result = match timeout(self.timeout, self.run(&mut slot, command)).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Console(format!(
                "no reply within {:?}",
                self.timeout
            ))),
        };
        if let Err(e) = &result {
            tracing::warn!("Remote console failed, reconnecting next time: {}", e);
            *slot = None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const FRAGMENT: usize = 4096;

    async fn read_packet(stream: &mut TcpStream) -> Packet {
        let len = stream.read_i32_le().await.unwrap() as usize;
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await.unwrap();
        Packet::decode(&payload).unwrap()
    }

    async fn fake_server(password: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let auth = read_packet(&mut stream).await;
            let id = if auth.body == password { auth.id } else { -1 };
            let reply = Packet {
                id,
                kind: TYPE_AUTH_RESPONSE,
                body: String::new(),
            };
            stream.write_all(&reply.encode()).await.unwrap();

            while let Ok(len) = stream.read_i32_le().await {
                let mut payload = vec![0u8; len as usize];
                stream.read_exact(&mut payload).await.unwrap();
                let request = Packet::decode(&payload).unwrap();
                let body = match request.kind {
                    TYPE_COMMAND => format!("ran {}", request.body),
                    other => format!("Unknown request {other:x}"),
                };
                for part in body.as_bytes().chunks(FRAGMENT) {
                    let reply = Packet {
                        id: request.id,
                        kind: TYPE_RESPONSE,
                        body: String::from_utf8_lossy(part).into_owned(),
                    };
                    stream.write_all(&reply.encode()).await.unwrap();
                }
            }
        });
        address
    }

    #[test]
    fn test_packet_layout() {
        let packet = Packet {
            id: 7,
            kind: TYPE_COMMAND,
            body: "list".into(),
        };
        let bytes = packet.encode();
        assert_eq!(&bytes[..4], &14i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
        assert_eq!(&bytes[12..], b"list\0\0");
        assert_eq!(Packet::decode(&bytes[4..]).unwrap(), packet);
    }

    #[test]
    fn test_short_packet_rejected() {
        assert!(matches!(
            Packet::decode(&[0, 0, 0]),
            Err(BridgeError::Console(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let address = fake_server("hunter2").await;
        let console = RconConsole::new(address, "hunter2", Duration::from_secs(2));
        assert_eq!(console.execute("whitelist list").await.unwrap(), "ran whitelist list");
        assert_eq!(console.execute("list").await.unwrap(), "ran list");
    }

    #[tokio::test]
    async fn test_long_reply_is_reassembled() {
        let address = fake_server("hunter2").await;
        let console = RconConsole::new(address, "hunter2", Duration::from_secs(2));
        let command = format!("say {}", "x".repeat(9000));
        let reply = console.execute(&command).await.unwrap();
        assert_eq!(reply.len(), 9008);
        assert_eq!(reply, format!("ran {command}"));
        assert_eq!(console.execute("list").await.unwrap(), "ran list");
    }

    #[tokio::test]
    async fn test_bad_password() {
        let address = fake_server("hunter2").await;
        let console = RconConsole::new(address, "wrong", Duration::from_secs(2));
        assert!(matches!(
            console.execute("list").await,
            Err(BridgeError::Console(_))
        ));
    }
}
